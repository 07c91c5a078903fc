// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GrandSlam (Apple ID) authentication client.
//!
//! ## Flow
//!
//! 1. [`auth::Authenticator`] runs the two-round SRP handshake
//!    (`init`, `complete`) through [`GsaClient::send`].
//! 2. When the server asks for a second factor, [`two_factor`] delivers and
//!    validates a code, then the handshake restarts from scratch.
//! 3. [`app_tokens`] trades the session for per-app tokens;
//!    [`login::LoginManager`] wraps the whole sequence for developer
//!    services.
//!
//! Endpoints are resolved through a per-client [`EndpointResolver`].

pub mod app_tokens;
pub mod auth;
pub mod endpoints;
pub mod login;
pub mod request;
pub mod two_factor;

pub use app_tokens::AppToken;
pub use auth::{Authenticator, LoginData};
pub use endpoints::{EndpointRef, EndpointResolver, GsaEndpoint, Region};
pub use login::{DeveloperLoginToken, LoginManager};
pub use request::{GsaRequest, GsaResponse};
pub use two_factor::{SecondFactorPrompt, TwoFactorMode};

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::anisette::{AnisetteData, AnisetteProvider, DeviceInfo, CLIENT_INFO_HEADER};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
use crate::plist_ext::{parse_dictionary, to_xml_bytes};

const OPERATION_CONTENT_TYPE: &str = "text/x-xml-plist";

/// Shared plumbing for every GrandSlam call: transport, device identity,
/// attestation source and endpoint cache.
#[derive(Clone)]
pub struct GsaClient {
    transport: Arc<dyn HttpTransport>,
    anisette: Arc<dyn AnisetteProvider>,
    device: DeviceInfo,
    resolver: Arc<EndpointResolver>,
}

impl GsaClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        anisette: Arc<dyn AnisetteProvider>,
        device: DeviceInfo,
        lookup_url: impl Into<String>,
    ) -> Self {
        let resolver = EndpointResolver::new(lookup_url, transport.clone(), device.clone());
        Self {
            transport,
            anisette,
            device,
            resolver: Arc::new(resolver),
        }
    }

    /// Client over `reqwest` using the configured lookup URL and timeout.
    pub fn from_config(
        config: &ClientConfig,
        anisette: Arc<dyn AnisetteProvider>,
        device: DeviceInfo,
    ) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::from_config(config)?);
        Ok(Self::new(transport, anisette, device, config.lookup_url.as_str()))
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    pub(crate) fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub(crate) fn anisette_provider(&self) -> &Arc<dyn AnisetteProvider> {
        &self.anisette
    }

    pub async fn anisette_data(&self) -> Result<AnisetteData> {
        self.anisette.fetch(&self.device).await
    }

    /// Send one operation and decode its reply.
    ///
    /// A reply whose `Status.ec` is non-zero fails with
    /// [`crate::error::OperationError`] before any payload is decoded. The
    /// status envelope wins over the HTTP status; a non-2xx reply without
    /// one fails with [`crate::error::Error::HttpStatus`].
    pub async fn send(&self, request: GsaRequest) -> Result<GsaResponse> {
        let anisette = self.anisette_data().await?;
        let url = self
            .resolver
            .resolve(&EndpointRef::Named(GsaEndpoint::GsService))
            .await?;

        let body = to_xml_bytes(request.envelope(&self.device, &anisette))?;
        let http_request = HttpRequest::new(Method::Post, url.as_str())
            .header("Content-Type", OPERATION_CONTENT_TYPE)
            .header("Accept", "*/*")
            .header("User-Agent", DeviceInfo::user_agent())
            .header(CLIENT_INFO_HEADER, self.device.client_info())
            .headers(anisette.headers())
            .body(body);

        debug!(operation = request.operation(), "Sending GrandSlam operation");
        let response = self.transport.send(http_request).await?;
        let payload = match parse_dictionary(&response.body, "GrandSlam response") {
            Ok(root) if root.contains_key("Response") => request::unwrap_status(root)?,
            parsed => {
                response.error_for_status(url.as_str())?;
                request::unwrap_status(parsed?)?
            }
        };
        request.decode(&payload)
    }

    /// Send a raw request with the shared headers attached; used by the
    /// two-factor endpoints, which do not use the operation envelope.
    pub(crate) async fn send_raw(&self, request: HttpRequest) -> Result<HttpResponse> {
        let anisette = self.anisette_data().await?;
        let request = request
            .header(CLIENT_INFO_HEADER, self.device.client_info())
            .headers(anisette.headers());
        self.transport.send(request).await
    }
}

impl fmt::Debug for GsaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GsaClient")
            .field("device_id", &self.device.device_id)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod fake;
