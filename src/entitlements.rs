// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Entitlements of a signed binary.
//!
//! Keys this crate understands are decoded into [`Entitlement`]; every other
//! key, and any recognized key whose value has an unexpected shape, is kept
//! as an opaque [`plist::Value`] and written back untouched. Order of keys
//! is preserved.

use plist::{Dictionary, Value};

use crate::developer::{CapabilitySetting, CapabilityType};
use crate::error::{ReconciliationError, Result};
use crate::plist_ext::to_xml_bytes;

pub const APPLICATION_IDENTIFIER: &str = "application-identifier";
pub const TEAM_IDENTIFIER: &str = "com.apple.developer.team-identifier";
pub const KEYCHAIN_ACCESS_GROUPS: &str = "keychain-access-groups";
pub const GET_TASK_ALLOW: &str = "get-task-allow";
pub const APP_GROUPS: &str = "com.apple.security.application-groups";
pub const ASSOCIATED_DOMAINS: &str = "com.apple.developer.associated-domains";
pub const APS_ENVIRONMENT: &str = "aps-environment";
pub const DATA_PROTECTION: &str = "com.apple.developer.default-data-protection";
pub const NETWORK_EXTENSION: &str = "com.apple.developer.networking.networkextension";
pub const MULTIPATH: &str = "com.apple.developer.networking.multipath";
pub const VPN_CONFIGURATION: &str = "com.apple.networking.vpn.configuration";
pub const SIRIKIT: &str = "com.apple.developer.siri";
pub const INTER_APP_AUDIO: &str = "inter-app-audio";
pub const WIRELESS_ACCESSORY: &str = "com.apple.external-accessory.wireless-configuration";
pub const HOMEKIT: &str = "com.apple.developer.homekit";
pub const HEALTHKIT: &str = "com.apple.developer.healthkit";

const DATA_PROTECTION_SETTING: &str = "DATA_PROTECTION_PERMISSION_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProtection {
    Complete,
    UnlessOpen,
    UntilFirstAuth,
}

impl DataProtection {
    fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "NSFileProtectionComplete" => Some(DataProtection::Complete),
            "NSFileProtectionCompleteUnlessOpen" => Some(DataProtection::UnlessOpen),
            "NSFileProtectionCompleteUntilFirstUserAuthentication" => {
                Some(DataProtection::UntilFirstAuth)
            }
            _ => None,
        }
    }

    fn raw(self) -> &'static str {
        match self {
            DataProtection::Complete => "NSFileProtectionComplete",
            DataProtection::UnlessOpen => "NSFileProtectionCompleteUnlessOpen",
            DataProtection::UntilFirstAuth => "NSFileProtectionCompleteUntilFirstUserAuthentication",
        }
    }

    fn option(self) -> &'static str {
        match self {
            DataProtection::Complete => "COMPLETE_PROTECTION",
            DataProtection::UnlessOpen => "PROTECTED_UNLESS_OPEN",
            DataProtection::UntilFirstAuth => "PROTECTED_UNTIL_FIRST_USER_AUTH",
        }
    }
}

/// A recognized entitlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entitlement {
    ApplicationIdentifier(String),
    TeamIdentifier(String),
    KeychainAccessGroups(Vec<String>),
    GetTaskAllow(bool),
    AppGroups(Vec<String>),
    AssociatedDomains(Vec<String>),
    /// `development` or `production`.
    ApsEnvironment(String),
    DataProtection(DataProtection),
    NetworkExtension(Vec<String>),
    Multipath(bool),
    VpnConfiguration(bool),
    SiriKit(bool),
    InterAppAudio(bool),
    WirelessAccessory(bool),
    HomeKit(bool),
    HealthKit(bool),
}

/// Capability an entitlement needs on the app ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityBinding {
    pub capability_type: CapabilityType,
    pub settings: Vec<CapabilitySetting>,
    /// Whether free (personal) teams may enable it.
    pub is_free: bool,
}

impl CapabilityBinding {
    fn new(capability_type: CapabilityType, is_free: bool) -> Self {
        Self {
            capability_type,
            settings: Vec::new(),
            is_free,
        }
    }
}

impl Entitlement {
    pub fn key(&self) -> &'static str {
        match self {
            Entitlement::ApplicationIdentifier(_) => APPLICATION_IDENTIFIER,
            Entitlement::TeamIdentifier(_) => TEAM_IDENTIFIER,
            Entitlement::KeychainAccessGroups(_) => KEYCHAIN_ACCESS_GROUPS,
            Entitlement::GetTaskAllow(_) => GET_TASK_ALLOW,
            Entitlement::AppGroups(_) => APP_GROUPS,
            Entitlement::AssociatedDomains(_) => ASSOCIATED_DOMAINS,
            Entitlement::ApsEnvironment(_) => APS_ENVIRONMENT,
            Entitlement::DataProtection(_) => DATA_PROTECTION,
            Entitlement::NetworkExtension(_) => NETWORK_EXTENSION,
            Entitlement::Multipath(_) => MULTIPATH,
            Entitlement::VpnConfiguration(_) => VPN_CONFIGURATION,
            Entitlement::SiriKit(_) => SIRIKIT,
            Entitlement::InterAppAudio(_) => INTER_APP_AUDIO,
            Entitlement::WirelessAccessory(_) => WIRELESS_ACCESSORY,
            Entitlement::HomeKit(_) => HOMEKIT,
            Entitlement::HealthKit(_) => HEALTHKIT,
        }
    }

    /// Decode `value` for `key`; `None` when the key is unknown or the value
    /// does not have the expected shape.
    pub fn decode(key: &str, value: &Value) -> Option<Self> {
        let entitlement = match key {
            APPLICATION_IDENTIFIER => Entitlement::ApplicationIdentifier(string(value)?),
            TEAM_IDENTIFIER => Entitlement::TeamIdentifier(string(value)?),
            KEYCHAIN_ACCESS_GROUPS => Entitlement::KeychainAccessGroups(strings(value)?),
            GET_TASK_ALLOW => Entitlement::GetTaskAllow(value.as_boolean()?),
            APP_GROUPS => Entitlement::AppGroups(strings(value)?),
            ASSOCIATED_DOMAINS => Entitlement::AssociatedDomains(strings(value)?),
            APS_ENVIRONMENT => Entitlement::ApsEnvironment(string(value)?),
            DATA_PROTECTION => {
                Entitlement::DataProtection(DataProtection::from_raw(value.as_string()?)?)
            }
            NETWORK_EXTENSION => Entitlement::NetworkExtension(strings(value)?),
            MULTIPATH => Entitlement::Multipath(value.as_boolean()?),
            VPN_CONFIGURATION => Entitlement::VpnConfiguration(value.as_boolean()?),
            SIRIKIT => Entitlement::SiriKit(value.as_boolean()?),
            INTER_APP_AUDIO => Entitlement::InterAppAudio(value.as_boolean()?),
            WIRELESS_ACCESSORY => Entitlement::WirelessAccessory(value.as_boolean()?),
            HOMEKIT => Entitlement::HomeKit(value.as_boolean()?),
            HEALTHKIT => Entitlement::HealthKit(value.as_boolean()?),
            _ => return None,
        };
        Some(entitlement)
    }

    pub fn encode(&self) -> Value {
        match self {
            Entitlement::ApplicationIdentifier(value)
            | Entitlement::TeamIdentifier(value)
            | Entitlement::ApsEnvironment(value) => Value::String(value.clone()),
            Entitlement::KeychainAccessGroups(values)
            | Entitlement::AppGroups(values)
            | Entitlement::AssociatedDomains(values)
            | Entitlement::NetworkExtension(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
            Entitlement::DataProtection(level) => Value::String(level.raw().into()),
            Entitlement::GetTaskAllow(flag)
            | Entitlement::Multipath(flag)
            | Entitlement::VpnConfiguration(flag)
            | Entitlement::SiriKit(flag)
            | Entitlement::InterAppAudio(flag)
            | Entitlement::WirelessAccessory(flag)
            | Entitlement::HomeKit(flag)
            | Entitlement::HealthKit(flag) => Value::Boolean(*flag),
        }
    }

    /// Capability this entitlement requires on the app ID, if any.
    pub fn capability(&self) -> Option<CapabilityBinding> {
        let binding = match self {
            Entitlement::ApplicationIdentifier(_)
            | Entitlement::TeamIdentifier(_)
            | Entitlement::KeychainAccessGroups(_)
            | Entitlement::GetTaskAllow(_) => return None,
            Entitlement::DataProtection(level) => CapabilityBinding {
                capability_type: CapabilityType::DataProtection,
                settings: vec![CapabilitySetting::new(DATA_PROTECTION_SETTING, level.option())],
                is_free: true,
            },
            Entitlement::AppGroups(_) => CapabilityBinding::new(CapabilityType::AppGroups, false),
            Entitlement::AssociatedDomains(_) => {
                CapabilityBinding::new(CapabilityType::AssociatedDomains, false)
            }
            Entitlement::ApsEnvironment(_) => {
                CapabilityBinding::new(CapabilityType::PushNotifications, false)
            }
            Entitlement::NetworkExtension(_) => {
                CapabilityBinding::new(CapabilityType::NetworkExtensions, false)
            }
            Entitlement::Multipath(_) => CapabilityBinding::new(CapabilityType::Multipath, false),
            Entitlement::VpnConfiguration(_) => {
                CapabilityBinding::new(CapabilityType::PersonalVpn, false)
            }
            Entitlement::SiriKit(_) => CapabilityBinding::new(CapabilityType::SiriKit, false),
            Entitlement::InterAppAudio(_) => {
                CapabilityBinding::new(CapabilityType::InterAppAudio, true)
            }
            Entitlement::WirelessAccessory(_) => {
                CapabilityBinding::new(CapabilityType::WirelessAccessoryConfiguration, true)
            }
            Entitlement::HomeKit(_) => CapabilityBinding::new(CapabilityType::HomeKit, true),
            Entitlement::HealthKit(_) => CapabilityBinding::new(CapabilityType::HealthKit, true),
        };
        Some(binding)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntitlementValue {
    Known(Entitlement),
    Opaque(Value),
}

/// Ordered entitlements map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entitlements {
    entries: Vec<(String, EntitlementValue)>,
}

impl Entitlements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dictionary(dict: Dictionary) -> Self {
        let entries = dict
            .into_iter()
            .map(|(key, value)| {
                let entry = match Entitlement::decode(&key, &value) {
                    Some(known) => EntitlementValue::Known(known),
                    None => EntitlementValue::Opaque(value),
                };
                (key, entry)
            })
            .collect();
        Self { entries }
    }

    /// Parse a binary or XML plist whose root is a dictionary.
    pub fn from_plist_bytes(bytes: &[u8]) -> Result<Self> {
        let value = Value::from_reader(std::io::Cursor::new(bytes))
            .map_err(|e| ReconciliationError::InvalidEntitlements(e.to_string()))?;
        let dict = value.into_dictionary().ok_or_else(|| {
            ReconciliationError::InvalidEntitlements("root is not a dictionary".into())
        })?;
        Ok(Self::from_dictionary(dict))
    }

    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for (key, entry) in &self.entries {
            let value = match entry {
                EntitlementValue::Known(known) => known.encode(),
                EntitlementValue::Opaque(raw) => raw.clone(),
            };
            dict.insert(key.clone(), value);
        }
        dict
    }

    /// XML plist, as expected by the signing engine.
    pub fn to_plist_bytes(&self) -> Result<Vec<u8>> {
        to_xml_bytes(self.to_dictionary())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&EntitlementValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, entry)| entry)
    }

    pub fn known(&self) -> impl Iterator<Item = &Entitlement> {
        self.entries.iter().filter_map(|(_, entry)| match entry {
            EntitlementValue::Known(known) => Some(known),
            EntitlementValue::Opaque(_) => None,
        })
    }

    /// Capabilities required by the recognized entitlements.
    pub fn capabilities(&self) -> Vec<CapabilityBinding> {
        self.known().filter_map(Entitlement::capability).collect()
    }

    /// Insert or replace a recognized entitlement, keeping its position.
    pub fn set(&mut self, entitlement: Entitlement) {
        let key = entitlement.key();
        let entry = EntitlementValue::Known(entitlement);
        match self.entries.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => *slot = entry,
            None => self.entries.push((key.to_string(), entry)),
        }
    }

    /// Drop recognized entitlements whose capability free teams cannot use.
    pub fn retain_free(&mut self) {
        self.entries.retain(|(_, entry)| match entry {
            EntitlementValue::Known(known) => known
                .capability()
                .is_none_or(|binding| binding.is_free),
            EntitlementValue::Opaque(_) => true,
        });
    }

    /// Point the team and bundle scoped keys at `team_id.bundle_id`.
    pub fn update_team_and_bundle(&mut self, team_id: &str, bundle_id: &str) {
        let app_identifier = format!("{team_id}.{bundle_id}");
        self.set(Entitlement::TeamIdentifier(team_id.to_string()));
        self.set(Entitlement::ApplicationIdentifier(app_identifier.clone()));
        self.set(Entitlement::KeychainAccessGroups(vec![app_identifier]));
    }

    /// Development certificates require `get-task-allow`.
    pub fn force_get_task_allow(&mut self) {
        self.set(Entitlement::GetTaskAllow(true));
    }

    pub fn app_groups(&self) -> Option<&[String]> {
        self.known().find_map(|known| match known {
            Entitlement::AppGroups(groups) => Some(groups.as_slice()),
            _ => None,
        })
    }

    pub fn set_app_groups(&mut self, groups: Vec<String>) {
        self.set(Entitlement::AppGroups(groups));
    }
}

fn string(value: &Value) -> Option<String> {
    value.as_string().map(str::to_string)
}

fn strings(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|entry| entry.as_string().map(str::to_string))
        .collect()
}
