// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GrandSlam endpoint lookup and caching.
//!
//! The service publishes its URL table from a bootstrap lookup endpoint.
//! The table is fetched at most once per [`EndpointResolver`]; concurrent
//! first callers share one in-flight lookup. A failed lookup leaves the
//! cache empty so the next call tries again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use crate::anisette::{DeviceInfo, CLIENT_INFO_HEADER, DEVICE_ID_HEADER};
use crate::error::{Error, ProtocolError, Result};
use crate::http::{HttpRequest, HttpTransport, Method};
use crate::plist_ext::{parse_dictionary, DictionaryExt};

/// Symbolic endpoint names published by the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GsaEndpoint {
    GsService,
    SecondaryAuth,
    TrustedDeviceSecondaryAuth,
    ValidateCode,
    MidStartProvisioning,
    MidFinishProvisioning,
}

impl GsaEndpoint {
    pub const ALL: [GsaEndpoint; 6] = [
        GsaEndpoint::GsService,
        GsaEndpoint::SecondaryAuth,
        GsaEndpoint::TrustedDeviceSecondaryAuth,
        GsaEndpoint::ValidateCode,
        GsaEndpoint::MidStartProvisioning,
        GsaEndpoint::MidFinishProvisioning,
    ];

    /// Key in the lookup response's `urls` dictionary.
    pub fn key(self) -> &'static str {
        match self {
            GsaEndpoint::GsService => "gsService",
            GsaEndpoint::SecondaryAuth => "secondaryAuth",
            GsaEndpoint::TrustedDeviceSecondaryAuth => "trustedDeviceSecondaryAuth",
            GsaEndpoint::ValidateCode => "validateCode",
            GsaEndpoint::MidStartProvisioning => "midStartProvisioning",
            GsaEndpoint::MidFinishProvisioning => "midFinishProvisioning",
        }
    }
}

impl fmt::Display for GsaEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Either a name to look up or a fixed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointRef {
    Named(GsaEndpoint),
    Url(Url),
}

/// Locale headers sent with the lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub locale: String,
    pub time_zone: String,
    pub utc_offset_secs: i32,
    pub country: Option<String>,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            locale: "en_US".to_string(),
            time_zone: "UTC".to_string(),
            utc_offset_secs: 0,
            country: Some("US".to_string()),
        }
    }
}

#[derive(Debug)]
struct EndpointTable {
    urls: HashMap<GsaEndpoint, Url>,
}

impl EndpointTable {
    fn decode(body: &[u8]) -> Result<Self> {
        let root = parse_dictionary(body, "endpoint lookup")?;
        let table = root.required_dictionary("urls")?;
        let mut urls = HashMap::with_capacity(GsaEndpoint::ALL.len());
        for endpoint in GsaEndpoint::ALL {
            let raw = table.required_string(endpoint.key())?;
            let url = Url::parse(raw).map_err(|e| Error::decode("endpoint URL", e))?;
            urls.insert(endpoint, url);
        }
        Ok(Self { urls })
    }
}

/// Memoizing resolver for [`EndpointRef`]s.
pub struct EndpointResolver {
    lookup_url: String,
    transport: Arc<dyn HttpTransport>,
    device: DeviceInfo,
    region: Region,
    table: OnceCell<EndpointTable>,
}

impl EndpointResolver {
    pub fn new(
        lookup_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        device: DeviceInfo,
    ) -> Self {
        Self {
            lookup_url: lookup_url.into(),
            transport,
            device,
            region: Region::default(),
            table: OnceCell::new(),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub async fn resolve(&self, endpoint: &EndpointRef) -> Result<Url> {
        match endpoint {
            EndpointRef::Url(url) => Ok(url.clone()),
            EndpointRef::Named(name) => {
                let table = self.table.get_or_try_init(|| self.lookup()).await?;
                table
                    .urls
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ProtocolError::MissingField(name.key()).into())
            }
        }
    }

    /// Whether the lookup table has been fetched.
    pub fn is_cached(&self) -> bool {
        self.table.initialized()
    }

    async fn lookup(&self) -> Result<EndpointTable> {
        debug!(url = %self.lookup_url, "Fetching GrandSlam endpoint table");
        let mut request = HttpRequest::new(Method::Get, self.lookup_url.as_str())
            .header(CLIENT_INFO_HEADER, self.device.client_info())
            .header(DEVICE_ID_HEADER, self.device.device_id.as_str())
            .header("X-Apple-I-Locale", self.region.locale.as_str())
            .header("X-Apple-I-TimeZone", self.region.time_zone.as_str())
            .header(
                "X-Apple-I-TimeZone-Offset",
                self.region.utc_offset_secs.to_string(),
            );
        if let Some(country) = &self.region.country {
            request = request.header("X-MMe-Country", country.as_str());
        }

        let response = self
            .transport
            .send(request)
            .await?
            .error_for_status(&self.lookup_url)?;
        let table = EndpointTable::decode(&response.body)?;
        info!(endpoints = table.urls.len(), "GrandSlam endpoint table loaded");
        Ok(table)
    }
}

impl fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("lookup_url", &self.lookup_url)
            .field("cached", &self.is_cached())
            .finish_non_exhaustive()
    }
}
