// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory developer services for reconciliation tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use plist::{Dictionary, Value};
use rcgen::{CertificateParams, DnType, KeyPair, SerialNumber};

use super::models::{
    AppGroup, BundleId, Capability, CapabilitySetting, CapabilityType, CertificateRecord, Device,
    DeviceRegistration, Membership, ProfileRecord, Team,
};
use super::DeveloperServices;
use crate::error::{Error, OperationError, Result};
use crate::plist_ext::to_xml_bytes;

pub(crate) const TEAM_ID: &str = "TEAM123456";

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ListTeams,
    ListCertificates,
    CreateCertificate,
    RevokeCertificate(String),
    ListDevices,
    RegisterDevice(String),
    FindBundleIds(String),
    CreateBundleId(String),
    ListCapabilities(String),
    CreateCapability(CapabilityType),
    UpdateCapability(CapabilityType),
    DeleteCapability(CapabilityType),
    DeleteProfile(String),
    CreateProfile {
        bundle_id: String,
        certificate_ids: Vec<String>,
        device_ids: Vec<String>,
    },
    ListAppGroups,
    CreateAppGroup(String),
    AssignAppGroup { bundle_id: String, group_id: String },
}

impl Call {
    fn name(&self) -> &'static str {
        match self {
            Call::ListTeams => "list_teams",
            Call::ListCertificates => "list_certificates",
            Call::CreateCertificate => "create_certificate",
            Call::RevokeCertificate(_) => "revoke_certificate",
            Call::ListDevices => "list_devices",
            Call::RegisterDevice(_) => "register_device",
            Call::FindBundleIds(_) => "find_bundle_ids",
            Call::CreateBundleId(_) => "create_bundle_id",
            Call::ListCapabilities(_) => "list_capabilities",
            Call::CreateCapability(_) => "create_capability",
            Call::UpdateCapability(_) => "update_capability",
            Call::DeleteCapability(_) => "delete_capability",
            Call::DeleteProfile(_) => "delete_profile",
            Call::CreateProfile { .. } => "create_profile",
            Call::ListAppGroups => "list_app_groups",
            Call::CreateAppGroup(_) => "create_app_group",
            Call::AssignAppGroup { .. } => "assign_app_group",
        }
    }
}

#[derive(Default)]
struct State {
    certificates: Vec<CertificateRecord>,
    devices: Vec<Device>,
    bundle_ids: Vec<BundleId>,
    capabilities: HashMap<String, Vec<Capability>>,
    app_groups: Vec<AppGroup>,
    next_id: u32,
    failing: Vec<&'static str>,
    calls: Vec<Call>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

pub(crate) struct MockDeveloperServices {
    free: bool,
    state: Mutex<State>,
}

impl MockDeveloperServices {
    pub(crate) fn new(free: bool) -> Self {
        Self {
            free,
            state: Mutex::new(State::default()),
        }
    }

    /// Make every call named `operation` (e.g. `"revoke_certificate"`) fail.
    pub(crate) fn fail(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.push(operation);
    }

    pub(crate) fn add_certificate(
        &self,
        serial: &str,
        expiration: DateTime<Utc>,
    ) -> CertificateRecord {
        let mut state = self.state.lock().unwrap();
        let record = CertificateRecord {
            id: state.next_id("C"),
            name: Some("Apple Development".into()),
            serial_number: serial.to_string(),
            expiration: Some(expiration),
            content: None,
        };
        state.certificates.push(record.clone());
        record
    }

    pub(crate) fn add_device(&self, name: &str, udid: &str) -> Device {
        let mut state = self.state.lock().unwrap();
        let device = Device {
            id: state.next_id("D"),
            name: name.to_string(),
            udid: udid.to_string(),
        };
        state.devices.push(device.clone());
        device
    }

    pub(crate) fn add_bundle_id(&self, identifier: &str, profile_ids: &[&str]) -> BundleId {
        let mut state = self.state.lock().unwrap();
        let bundle = BundleId {
            id: state.next_id("B"),
            identifier: identifier.to_string(),
            name: identifier.to_string(),
            profile_ids: profile_ids.iter().map(|id| id.to_string()).collect(),
        };
        state.bundle_ids.push(bundle.clone());
        bundle
    }

    pub(crate) fn add_capability(
        &self,
        bundle_id: &str,
        capability_type: CapabilityType,
        settings: Vec<CapabilitySetting>,
    ) {
        let mut state = self.state.lock().unwrap();
        let capability = Capability {
            id: state.next_id("K"),
            capability_type,
            settings,
        };
        state
            .capabilities
            .entry(bundle_id.to_string())
            .or_default()
            .push(capability);
    }

    pub(crate) fn add_app_group(&self, identifier: &str) -> AppGroup {
        let mut state = self.state.lock().unwrap();
        let group = AppGroup {
            id: state.next_id("G"),
            name: identifier.to_string(),
            identifier: identifier.to_string(),
        };
        state.app_groups.push(group.clone());
        group
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Recorded calls to `operation`, in order.
    pub(crate) fn calls_to(&self, operation: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.name() == operation)
            .collect()
    }

    pub(crate) fn capabilities(&self, bundle_id: &str) -> Vec<Capability> {
        let state = self.state.lock().unwrap();
        state.capabilities.get(bundle_id).cloned().unwrap_or_default()
    }

    pub(crate) fn certificates(&self) -> Vec<CertificateRecord> {
        self.state.lock().unwrap().certificates.clone()
    }

    fn record(&self, call: Call) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        let name = call.name();
        state.calls.push(call);
        if state.failing.contains(&name) {
            return Err(OperationError::new(-1, format!("{name} failed")).into());
        }
        Ok(state)
    }
}

#[async_trait]
impl DeveloperServices for MockDeveloperServices {
    async fn list_teams(&self) -> Result<Vec<Team>> {
        self.record(Call::ListTeams)?;
        let memberships = if self.free {
            vec![]
        } else {
            vec![Membership {
                name: "Apple Developer Program".into(),
                platform: "ios".into(),
            }]
        };
        Ok(vec![Team {
            id: TEAM_ID.into(),
            name: "Test Team".into(),
            status: "active".into(),
            memberships,
        }])
    }

    async fn list_certificates(&self) -> Result<Vec<CertificateRecord>> {
        Ok(self.record(Call::ListCertificates)?.certificates.clone())
    }

    async fn create_certificate(&self, _csr_pem: &str) -> Result<CertificateRecord> {
        let mut state = self.record(Call::CreateCertificate)?;
        let id = state.next_id("C");
        let serial = vec![0x40, state.next_id as u8];
        let content = issue_certificate(&serial)?;
        let record = CertificateRecord {
            id,
            name: Some("Apple Development".into()),
            serial_number: hex::encode_upper(&serial),
            expiration: Some(Utc.with_ymd_and_hms(2035, 1, 1, 0, 0, 0).unwrap()),
            content: Some(content),
        };
        state.certificates.push(record.clone());
        Ok(record)
    }

    async fn revoke_certificate(&self, id: &str) -> Result<()> {
        let mut state = self.record(Call::RevokeCertificate(id.to_string()))?;
        state.certificates.retain(|certificate| certificate.id != id);
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.record(Call::ListDevices)?.devices.clone())
    }

    async fn register_device(&self, name: &str, udid: &str) -> Result<DeviceRegistration> {
        let mut state = self.record(Call::RegisterDevice(udid.to_string()))?;
        if state.devices.iter().any(|device| device.udid == udid) {
            return Ok(DeviceRegistration::AlreadyRegistered);
        }
        let device = Device {
            id: state.next_id("D"),
            name: name.to_string(),
            udid: udid.to_string(),
        };
        state.devices.push(device.clone());
        Ok(DeviceRegistration::Created(device))
    }

    async fn find_bundle_ids(&self, identifier: &str) -> Result<Vec<BundleId>> {
        let state = self.record(Call::FindBundleIds(identifier.to_string()))?;
        Ok(state
            .bundle_ids
            .iter()
            .filter(|bundle| bundle.identifier.starts_with(identifier))
            .cloned()
            .collect())
    }

    async fn create_bundle_id(&self, name: &str, identifier: &str) -> Result<BundleId> {
        let mut state = self.record(Call::CreateBundleId(identifier.to_string()))?;
        let bundle = BundleId {
            id: state.next_id("B"),
            identifier: identifier.to_string(),
            name: name.to_string(),
            profile_ids: Vec::new(),
        };
        state.bundle_ids.push(bundle.clone());
        Ok(bundle)
    }

    async fn list_capabilities(&self, bundle_id: &str) -> Result<Vec<Capability>> {
        let state = self.record(Call::ListCapabilities(bundle_id.to_string()))?;
        Ok(state.capabilities.get(bundle_id).cloned().unwrap_or_default())
    }

    async fn create_capability(
        &self,
        bundle_id: &str,
        capability_type: &CapabilityType,
        settings: &[CapabilitySetting],
    ) -> Result<Capability> {
        let mut state = self.record(Call::CreateCapability(capability_type.clone()))?;
        let capability = Capability {
            id: state.next_id("K"),
            capability_type: capability_type.clone(),
            settings: settings.to_vec(),
        };
        state
            .capabilities
            .entry(bundle_id.to_string())
            .or_default()
            .push(capability.clone());
        Ok(capability)
    }

    async fn update_capability(
        &self,
        capability_id: &str,
        capability_type: &CapabilityType,
        settings: &[CapabilitySetting],
    ) -> Result<()> {
        let mut state = self.record(Call::UpdateCapability(capability_type.clone()))?;
        for capability in state.capabilities.values_mut().flatten() {
            if capability.id == capability_id {
                capability.settings = settings.to_vec();
            }
        }
        Ok(())
    }

    async fn delete_capability(&self, capability_id: &str) -> Result<()> {
        let kind = {
            let state = self.state.lock().unwrap();
            state
                .capabilities
                .values()
                .flatten()
                .find(|capability| capability.id == capability_id)
                .map(|capability| capability.capability_type.clone())
                .ok_or_else(|| OperationError::new(404, "no such capability"))?
        };
        let mut state = self.record(Call::DeleteCapability(kind))?;
        for capabilities in state.capabilities.values_mut() {
            capabilities.retain(|capability| capability.id != capability_id);
        }
        Ok(())
    }

    async fn delete_profile(&self, profile_id: &str) -> Result<()> {
        let mut state = self.record(Call::DeleteProfile(profile_id.to_string()))?;
        for bundle in &mut state.bundle_ids {
            bundle.profile_ids.retain(|id| id != profile_id);
        }
        Ok(())
    }

    async fn create_profile(
        &self,
        name: &str,
        bundle_id: &str,
        certificate_ids: &[String],
        device_ids: &[String],
    ) -> Result<ProfileRecord> {
        let mut state = self.record(Call::CreateProfile {
            bundle_id: bundle_id.to_string(),
            certificate_ids: certificate_ids.to_vec(),
            device_ids: device_ids.to_vec(),
        })?;
        let id = state.next_id("P");
        let identifier = state
            .bundle_ids
            .iter_mut()
            .find(|bundle| bundle.id == bundle_id)
            .map(|bundle| {
                bundle.profile_ids.push(id.clone());
                bundle.identifier.clone()
            })
            .ok_or_else(|| OperationError::new(404, "no such bundle id"))?;
        let uuid = format!("00000000-0000-0000-0000-{:012}", state.next_id);
        Ok(ProfileRecord {
            id,
            name: name.to_string(),
            uuid: Some(uuid.clone()),
            content: signed_profile(name, &uuid, &identifier)?,
        })
    }

    async fn list_app_groups(&self) -> Result<Vec<AppGroup>> {
        Ok(self.record(Call::ListAppGroups)?.app_groups.clone())
    }

    async fn create_app_group(&self, name: &str, identifier: &str) -> Result<AppGroup> {
        let mut state = self.record(Call::CreateAppGroup(identifier.to_string()))?;
        let group = AppGroup {
            id: state.next_id("G"),
            name: name.to_string(),
            identifier: identifier.to_string(),
        };
        state.app_groups.push(group.clone());
        Ok(group)
    }

    async fn assign_app_group(&self, bundle_id: &str, group_id: &str) -> Result<()> {
        self.record(Call::AssignAppGroup {
            bundle_id: bundle_id.to_string(),
            group_id: group_id.to_string(),
        })?;
        Ok(())
    }
}

/// Self-signed development certificate with the team in the subject OU.
pub(crate) fn issue_certificate(serial: &[u8]) -> Result<Vec<u8>> {
    let crypto = |e: rcgen::Error| Error::Crypto(e.to_string());
    let mut params = CertificateParams::new(Vec::<String>::new()).map_err(crypto)?;
    params
        .distinguished_name
        .push(DnType::CommonName, "Apple Development: user@example.com");
    params
        .distinguished_name
        .push(DnType::OrganizationalUnitName, TEAM_ID);
    params.serial_number = Some(SerialNumber::from(serial.to_vec()));
    params.not_after = rcgen::date_time_ymd(2035, 1, 1);
    let key = KeyPair::generate().map_err(crypto)?;
    Ok(params.self_signed(&key).map_err(crypto)?.der().to_vec())
}

/// Profile bytes shaped like a CMS envelope around the XML plist payload.
pub(crate) fn signed_profile(name: &str, uuid: &str, bundle_identifier: &str) -> Result<Vec<u8>> {
    let mut entitlements = Dictionary::new();
    entitlements.insert(
        "application-identifier".into(),
        Value::String(format!("{TEAM_ID}.{bundle_identifier}")),
    );
    entitlements.insert("get-task-allow".into(), Value::Boolean(true));

    let mut payload = Dictionary::new();
    payload.insert("Name".into(), Value::String(name.into()));
    payload.insert("UUID".into(), Value::String(uuid.into()));
    payload.insert(
        "TeamIdentifier".into(),
        Value::Array(vec![Value::String(TEAM_ID.into())]),
    );
    let expiration = SystemTime::from(Utc.with_ymd_and_hms(2035, 1, 1, 0, 0, 0).unwrap());
    payload.insert("ExpirationDate".into(), Value::Date(expiration.into()));
    payload.insert("Entitlements".into(), Value::Dictionary(entitlements));

    let mut bytes = vec![0x30, 0x80, 0x06, 0x09];
    bytes.extend(to_xml_bytes(payload)?);
    bytes.extend([0xa0, 0x82, 0x00, 0x00]);
    Ok(bytes)
}
