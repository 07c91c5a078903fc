// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Device identity and attestation ("anisette") material.
//!
//! Anisette data is produced by an external provider and consumed here as
//! an opaque set of headers. Every GrandSlam and developer-services request
//! carries both the [`DeviceInfo`] headers and a fresh [`AnisetteData`].
//!
//! ## Headers
//!
//! | Header | Source |
//! |--------|--------|
//! | `X-Mme-Device-Id` | device id |
//! | `X-Apple-I-ROM` / `X-Apple-I-MLB` / `X-Apple-I-SRL-NO` | device hardware ids |
//! | `X-MMe-Client-Info` | model id rendered into the client-info string |
//! | `X-Apple-I-Client-Time` | provider timestamp (UTC, second precision) |
//! | `X-Apple-I-MD-RINFO` | routing info |
//! | `X-Apple-I-MD-M` | machine id |
//! | `X-Apple-I-MD-LU` | local user id |
//! | `X-Apple-I-MD` | one-time password |
//! | `X-Apple-Locale` / `X-Apple-I-TimeZone` | locale and time zone |

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEVICE_ID_HEADER: &str = "X-Mme-Device-Id";
pub const CLIENT_INFO_HEADER: &str = "X-MMe-Client-Info";
pub const XCODE_VERSION_HEADER: &str = "X-Xcode-Version";

/// Xcode release whose client identity is presented to developer services.
pub const XCODE_VERSION: &str = "14.2 (14C18)";

const MACOS_VERSION: &str = "10.14.6";
const MACOS_BUILD: &str = "18G103";
const AUTHKIT_VERSION: &str = "1";
const AKD_VERSION: &str = "1.0";
const CFNETWORK_VERSION: &str = "978.0.7";
const DARWIN_VERSION: &str = "18.7.0";

const DEFAULT_LOCALE: &str = "en_US";
const DEFAULT_TIME_ZONE: &str = "UTC";

/// Stable hardware identity of the client machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub rom_address: String,
    pub mlb_serial_number: String,
    pub serial_number: String,
    /// Hardware model, e.g. `MacBookPro11,5`.
    pub model_id: String,
}

impl DeviceInfo {
    /// `X-MMe-Client-Info` value.
    pub fn client_info(&self) -> String {
        format!(
            "<{}> <Mac OS X;{MACOS_VERSION};{MACOS_BUILD}> \
             <com.apple.AuthKit/{AUTHKIT_VERSION} (com.apple.akd/{AKD_VERSION})>",
            self.model_id
        )
    }

    /// `User-Agent` presented to GrandSlam.
    pub fn user_agent() -> String {
        format!("akd/{AKD_VERSION} CFNetwork/{CFNETWORK_VERSION} Darwin/{DARWIN_VERSION}")
    }

    /// Hardware headers, also merged into the `cpd` client-data dictionary.
    pub fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (DEVICE_ID_HEADER.to_string(), self.device_id.clone()),
            ("X-Apple-I-ROM".to_string(), self.rom_address.clone()),
            ("X-Apple-I-MLB".to_string(), self.mlb_serial_number.clone()),
            ("X-Apple-I-SRL-NO".to_string(), self.serial_number.clone()),
        ])
    }
}

/// Per-request attestation material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnisetteData {
    pub client_time: DateTime<Utc>,
    pub routing_info: u64,
    pub machine_id: String,
    pub local_user_id: String,
    pub one_time_password: String,
    pub locale: String,
    pub time_zone: String,
    pub device_id: Option<String>,
}

impl AnisetteData {
    pub fn new(
        client_time: DateTime<Utc>,
        routing_info: u64,
        machine_id: impl Into<String>,
        local_user_id: impl Into<String>,
        one_time_password: impl Into<String>,
    ) -> Self {
        Self {
            client_time,
            routing_info,
            machine_id: machine_id.into(),
            local_user_id: local_user_id.into(),
            one_time_password: one_time_password.into(),
            locale: DEFAULT_LOCALE.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            device_id: None,
        }
    }

    /// Attestation headers. Also merged into the `cpd` dictionary.
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::from([
            ("X-Apple-Locale".to_string(), self.locale.clone()),
            ("X-Apple-I-TimeZone".to_string(), self.time_zone.clone()),
            (
                "X-Apple-I-Client-Time".to_string(),
                self.client_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ),
            ("X-Apple-I-MD-RINFO".to_string(), self.routing_info.to_string()),
            ("X-Apple-I-MD-M".to_string(), self.machine_id.clone()),
            ("X-Apple-I-MD-LU".to_string(), self.local_user_id.clone()),
            ("X-Apple-I-MD".to_string(), self.one_time_password.clone()),
        ]);
        if let Some(device_id) = &self.device_id {
            headers.insert(DEVICE_ID_HEADER.to_string(), device_id.clone());
        }
        headers
    }
}

/// Source of attestation material. Implementations are external.
#[async_trait]
pub trait AnisetteProvider: Send + Sync {
    async fn fetch(&self, device: &DeviceInfo) -> Result<AnisetteData>;
}

/// Provider that always returns the same data.
///
/// Useful for tests and for callers that obtained attestation material out
/// of band.
#[derive(Debug, Clone)]
pub struct StaticAnisetteProvider {
    data: AnisetteData,
}

impl StaticAnisetteProvider {
    pub fn new(data: AnisetteData) -> Self {
        Self { data }
    }
}

#[async_trait]
impl AnisetteProvider for StaticAnisetteProvider {
    async fn fetch(&self, _device: &DeviceInfo) -> Result<AnisetteData> {
        Ok(self.data.clone())
    }
}
