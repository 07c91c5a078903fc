// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provisioning profile issuance.
//!
//! A profile is reissued on every run so it always covers the current
//! certificate and device list. A single stale profile is deleted first.
//! When several exist they are left in place.

use std::io::Cursor;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use plist::{Dictionary, Value};
use tracing::{info, warn};

use super::applications::find_bundle;
use super::context::ProvisioningContext;
use crate::credentials::{normalize_serial, CredentialSet};
use crate::entitlements::Entitlements;
use crate::error::{ReconciliationError, Result};
use crate::plist_ext::DictionaryExt;

const XML_START: &[u8] = b"<?xml";
const XML_END: &[u8] = b"</plist>";

/// Decoded `.mobileprovision` payload.
#[derive(Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub uuid: String,
    pub team_identifier: String,
    pub expiry: DateTime<Utc>,
    pub entitlements: Entitlements,
    /// Signed bytes as issued, to embed in the bundle.
    pub raw: Vec<u8>,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("team_identifier", &self.team_identifier)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl Profile {
    /// Read the XML plist embedded in the signed envelope.
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        let invalid = || ReconciliationError::InvalidProfileData;

        let start = find(&raw, XML_START).ok_or_else(invalid)?;
        let end = find(&raw[start..], XML_END).ok_or_else(invalid)? + start + XML_END.len();
        let payload = Value::from_reader_xml(Cursor::new(&raw[start..end]))
            .ok()
            .and_then(Value::into_dictionary)
            .ok_or_else(invalid)?;

        let expiry = payload
            .get("ExpirationDate")
            .and_then(Value::as_date)
            .map(|date| DateTime::<Utc>::from(SystemTime::from(date)))
            .ok_or_else(invalid)?;
        let team_identifier = payload
            .get("TeamIdentifier")
            .and_then(Value::as_array)
            .and_then(|teams| teams.first())
            .and_then(Value::as_string)
            .ok_or_else(invalid)?
            .to_string();
        let entitlements = payload
            .get("Entitlements")
            .and_then(Value::as_dictionary)
            .cloned()
            .map(Entitlements::from_dictionary)
            .unwrap_or_default();

        Ok(Self {
            name: required(&payload, "Name")?,
            uuid: required(&payload, "UUID")?,
            team_identifier,
            expiry,
            entitlements,
            raw,
        })
    }
}

fn required(payload: &Dictionary, key: &'static str) -> Result<String> {
    payload
        .optional_string(key)
        .map(str::to_string)
        .ok_or_else(|| ReconciliationError::InvalidProfileData.into())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Issue a fresh development profile for the app ID `bundle_identifier`,
/// covering the credential's certificate and every registered device.
pub async fn issue_profile(
    ctx: &ProvisioningContext,
    bundle_identifier: &str,
    credential: &CredentialSet,
) -> Result<Profile> {
    let bundle = find_bundle(ctx, bundle_identifier)
        .await?
        .ok_or_else(|| ReconciliationError::BundleIdNotFound(bundle_identifier.to_string()))?;

    match bundle.profile_ids.as_slice() {
        [] => {}
        [stale] => {
            ctx.check_cancelled()?;
            ctx.services.delete_profile(stale).await?;
            info!(profile_id = %stale, bundle = %bundle.identifier, "Deleted stale profile");
        }
        stale => {
            warn!(
                count = stale.len(),
                bundle = %bundle.identifier,
                "Several profiles exist for app ID, leaving them in place"
            );
        }
    }

    let serial = credential.certificate.serial_number();
    let certificate_ids: Vec<String> = ctx
        .services
        .list_certificates()
        .await?
        .into_iter()
        .filter(|record| normalize_serial(&record.serial_number) == serial)
        .map(|record| record.id)
        .collect();
    let device_ids: Vec<String> = ctx
        .services
        .list_devices()
        .await?
        .into_iter()
        .map(|device| device.id)
        .collect();

    let record = ctx
        .services
        .create_profile(
            &format!("XTL profile {}", bundle.identifier),
            &bundle.id,
            &certificate_ids,
            &device_ids,
        )
        .await?;
    let profile = Profile::parse(record.content)?;
    info!(
        uuid = %profile.uuid,
        bundle = %bundle.identifier,
        devices = device_ids.len(),
        "Issued provisioning profile"
    );
    Ok(profile)
}
