// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Records returned by developer services.
//!
//! JSON:API resources are decoded into private `*Attributes` structs and
//! flattened into the public records below; the legacy plist surface
//! (teams, app groups) is decoded by hand from [`plist::Dictionary`].

use std::fmt;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use plist::Dictionary;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plist_ext::DictionaryExt;

// =============================================================================
// Teams (legacy plist API)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub name: String,
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub status: String,
    pub memberships: Vec<Membership>,
}

impl Team {
    /// Free (personal) teams have no iOS Apple Developer Program membership.
    pub fn is_free(&self) -> bool {
        !self.memberships.iter().any(|membership| {
            membership.platform == "ios" && membership.name.contains("Apple Developer Program")
        })
    }

    pub(crate) fn from_plist(dict: &Dictionary) -> Result<Self> {
        let memberships = dict
            .get("memberships")
            .and_then(plist::Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(plist::Value::as_dictionary)
                    .map(|entry| Membership {
                        name: entry.optional_string("name").unwrap_or_default().to_string(),
                        platform: entry.optional_string("platform").unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id: dict.required_string("teamId")?.to_string(),
            name: dict.optional_string("name").unwrap_or_default().to_string(),
            status: dict.optional_string("status").unwrap_or_default().to_string(),
            memberships,
        })
    }
}

// =============================================================================
// App groups (legacy plist API)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppGroup {
    /// Opaque record id used when assigning the group.
    pub id: String,
    pub name: String,
    /// Canonical `group.` identifier.
    pub identifier: String,
}

impl AppGroup {
    pub(crate) fn from_plist(dict: &Dictionary) -> Result<Self> {
        Ok(Self {
            id: dict.required_string("applicationGroup")?.to_string(),
            name: dict.optional_string("name").unwrap_or_default().to_string(),
            identifier: dict.required_string("identifier")?.to_string(),
        })
    }
}

// =============================================================================
// Certificates
// =============================================================================

/// Remote certificate record.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub id: String,
    pub name: Option<String>,
    pub serial_number: String,
    pub expiration: Option<DateTime<Utc>>,
    /// DER content, present when the service returned it.
    pub content: Option<Vec<u8>>,
}

impl CertificateRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_none_or(|expiration| expiration <= now)
    }
}

impl fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("id", &self.id)
            .field("serial_number", &self.serial_number)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CertificateAttributes {
    name: Option<String>,
    serial_number: Option<String>,
    expiration_date: Option<DateTime<Utc>>,
    certificate_content: Option<String>,
}

impl CertificateRecord {
    pub(crate) fn from_resource(resource: Resource<CertificateAttributes>) -> Result<Self> {
        let attributes = resource.attributes.unwrap_or_default();
        let content = attributes
            .certificate_content
            .map(|encoded| decode_base64(&encoded, "certificate content"))
            .transpose()?;
        Ok(Self {
            id: resource.id,
            name: attributes.name,
            serial_number: attributes.serial_number.unwrap_or_default().to_ascii_uppercase(),
            expiration: attributes.expiration_date,
            content,
        })
    }
}

// =============================================================================
// Devices
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub udid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceAttributes {
    name: Option<String>,
    udid: Option<String>,
}

impl Device {
    pub(crate) fn from_resource(resource: Resource<DeviceAttributes>) -> Self {
        let attributes = resource.attributes.unwrap_or_default();
        Self {
            id: resource.id,
            name: attributes.name.unwrap_or_default(),
            udid: attributes.udid.unwrap_or_default(),
        }
    }
}

/// Outcome of a device registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRegistration {
    Created(Device),
    AlreadyRegistered,
}

// =============================================================================
// Bundle IDs
// =============================================================================

/// Application identifier record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleId {
    pub id: String,
    pub identifier: String,
    pub name: String,
    /// Profiles currently bound to this identifier. Only populated by
    /// lookups that include the `profiles` relationship.
    pub profile_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BundleIdAttributes {
    identifier: Option<String>,
    name: Option<String>,
}

impl BundleId {
    pub(crate) fn from_resource(resource: Resource<BundleIdAttributes>) -> Self {
        let profile_ids = resource.related_ids("profiles");
        let attributes = resource.attributes.unwrap_or_default();
        Self {
            id: resource.id,
            identifier: attributes.identifier.unwrap_or_default(),
            name: attributes.name.unwrap_or_default(),
            profile_ids,
        }
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Capability kinds known to this crate. Unknown kinds reported by the
/// service are kept as [`CapabilityType::Other`] so they can still be
/// diffed and deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CapabilityType {
    AppGroups,
    AssociatedDomains,
    DataProtection,
    HealthKit,
    HomeKit,
    InAppPurchase,
    InterAppAudio,
    Multipath,
    NetworkExtensions,
    PersonalVpn,
    PushNotifications,
    SiriKit,
    WirelessAccessoryConfiguration,
    Other(String),
}

impl CapabilityType {
    pub fn as_str(&self) -> &str {
        match self {
            CapabilityType::AppGroups => "APP_GROUPS",
            CapabilityType::AssociatedDomains => "ASSOCIATED_DOMAINS",
            CapabilityType::DataProtection => "DATA_PROTECTION",
            CapabilityType::HealthKit => "HEALTHKIT",
            CapabilityType::HomeKit => "HOMEKIT",
            CapabilityType::InAppPurchase => "IN_APP_PURCHASE",
            CapabilityType::InterAppAudio => "INTER_APP_AUDIO",
            CapabilityType::Multipath => "MULTIPATH",
            CapabilityType::NetworkExtensions => "NETWORK_EXTENSIONS",
            CapabilityType::PersonalVpn => "PERSONAL_VPN",
            CapabilityType::PushNotifications => "PUSH_NOTIFICATIONS",
            CapabilityType::SiriKit => "SIRIKIT",
            CapabilityType::WirelessAccessoryConfiguration => "WIRELESS_ACCESSORY_CONFIGURATION",
            CapabilityType::Other(raw) => raw,
        }
    }

    /// Capabilities the service refuses to remove from an app ID.
    pub fn is_removable(&self) -> bool {
        !matches!(self, CapabilityType::InAppPurchase)
    }
}

impl From<String> for CapabilityType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "APP_GROUPS" => CapabilityType::AppGroups,
            "ASSOCIATED_DOMAINS" => CapabilityType::AssociatedDomains,
            "DATA_PROTECTION" => CapabilityType::DataProtection,
            "HEALTHKIT" => CapabilityType::HealthKit,
            "HOMEKIT" => CapabilityType::HomeKit,
            "IN_APP_PURCHASE" => CapabilityType::InAppPurchase,
            "INTER_APP_AUDIO" => CapabilityType::InterAppAudio,
            "MULTIPATH" => CapabilityType::Multipath,
            "NETWORK_EXTENSIONS" => CapabilityType::NetworkExtensions,
            "PERSONAL_VPN" => CapabilityType::PersonalVpn,
            "PUSH_NOTIFICATIONS" => CapabilityType::PushNotifications,
            "SIRIKIT" => CapabilityType::SiriKit,
            "WIRELESS_ACCESSORY_CONFIGURATION" => CapabilityType::WirelessAccessoryConfiguration,
            _ => CapabilityType::Other(raw),
        }
    }
}

impl From<CapabilityType> for String {
    fn from(kind: CapabilityType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOption {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySetting {
    pub key: String,
    #[serde(default)]
    pub options: Vec<CapabilityOption>,
}

impl CapabilitySetting {
    pub fn new(key: impl Into<String>, option: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            options: vec![CapabilityOption { key: option.into() }],
        }
    }
}

/// Capability binding on an app ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub id: String,
    pub capability_type: CapabilityType,
    pub settings: Vec<CapabilitySetting>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CapabilityAttributes {
    capability_type: Option<CapabilityType>,
    settings: Option<Vec<CapabilitySetting>>,
}

impl Capability {
    /// Records without a capability type are skipped by callers.
    pub(crate) fn from_resource(resource: Resource<CapabilityAttributes>) -> Option<Self> {
        let attributes = resource.attributes.unwrap_or_default();
        Some(Self {
            id: resource.id,
            capability_type: attributes.capability_type?,
            settings: attributes.settings.unwrap_or_default(),
        })
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// Remote provisioning profile record.
#[derive(Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub id: String,
    pub name: String,
    pub uuid: Option<String>,
    /// Signed `.mobileprovision` bytes.
    pub content: Vec<u8>,
}

impl fmt::Debug for ProfileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("content_len", &self.content.len())
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileAttributes {
    name: Option<String>,
    uuid: Option<String>,
    profile_content: Option<String>,
}

impl ProfileRecord {
    /// Missing or undecodable content is [`crate::error::ReconciliationError::InvalidProfileData`].
    pub(crate) fn from_resource(resource: Resource<ProfileAttributes>) -> Result<Self> {
        let attributes = resource.attributes.unwrap_or_default();
        let content = attributes
            .profile_content
            .and_then(|encoded| Base64::decode_vec(encoded.trim()).ok())
            .filter(|content| !content.is_empty())
            .ok_or(crate::error::ReconciliationError::InvalidProfileData)?;
        Ok(Self {
            id: resource.id,
            name: attributes.name.unwrap_or_default(),
            uuid: attributes.uuid,
            content,
        })
    }
}

// =============================================================================
// JSON:API plumbing
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct Document<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Resource<A> {
    pub id: String,
    pub attributes: Option<A>,
    pub relationships: Option<serde_json::Map<String, serde_json::Value>>,
}

impl<A> Resource<A> {
    /// Ids listed under `relationships.<name>.data`.
    fn related_ids(&self, name: &str) -> Vec<String> {
        self.relationships
            .as_ref()
            .and_then(|relationships| relationships.get(name))
            .and_then(|relationship| relationship.get("data"))
            .and_then(serde_json::Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("id").and_then(serde_json::Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn decode_base64(encoded: &str, what: &'static str) -> Result<Vec<u8>> {
    Base64::decode_vec(encoded.trim()).map_err(|e| Error::decode(what, e))
}
