// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Second-factor delivery and code validation.
//!
//! | Mode | Trigger | Validation |
//! |------|---------|------------|
//! | Trusted device | `GET trustedDeviceSecondaryAuth` | `GET validateCode`, code in `security-code` header |
//! | SMS | `POST …/auth/verify/phone/put?mode=sms` | `POST …/auth/verify/phone/securitycode` |
//!
//! A rejected code surfaces as [`Error::IncorrectVerificationCode`] so the
//! caller can re-prompt; a prompt that yields no code is
//! [`Error::UserCancelled`].

use async_trait::async_trait;
use plist::{Dictionary, Value};
use tracing::{debug, info};
use url::Url;

use super::auth::LoginData;
use super::endpoints::{EndpointRef, GsaEndpoint};
use super::GsaClient;
use crate::anisette::{XCODE_VERSION, XCODE_VERSION_HEADER};
use crate::error::{Error, OperationError, Result};
use crate::http::{HttpRequest, HttpResponse, Method};
use crate::plist_ext::{parse_dictionary, to_xml_bytes, DictionaryExt};

const SMS_TRIGGER_URL: &str = "https://gsa.apple.com/auth/verify/phone/put?mode=sms";
const SMS_VALIDATE_URL: &str =
    "https://gsa.apple.com/auth/verify/phone/securitycode?referrer=/auth/verify/phone/put";

/// The service does not expose the phone list here; the first registered
/// number always has id `1`.
const DEFAULT_PHONE_NUMBER_ID: &str = "1";

pub(crate) const APP_INFO: &str = "com.apple.gs.xcode.auth";

/// Source of verification codes, usually an interactive prompt.
#[async_trait]
pub trait SecondFactorPrompt: Send + Sync {
    /// Return the code the user received, or `None` to abort the login.
    async fn fetch_code(&self) -> Option<String>;
}

/// Delivery channel requested by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorMode {
    TrustedDevice,
    Sms,
}

impl TwoFactorMode {
    /// Map the `url` token of a `409` login reply.
    pub fn from_auth_url(token: &str) -> Option<Self> {
        match token {
            "trustedDeviceSecondaryAuth" => Some(TwoFactorMode::TrustedDevice),
            "secondaryAuth" => Some(TwoFactorMode::Sms),
            _ => None,
        }
    }
}

/// Deliver a code over `mode` and validate the user's answer.
pub(crate) async fn verify(
    client: &GsaClient,
    mode: TwoFactorMode,
    login: &LoginData,
    prompt: &dyn SecondFactorPrompt,
) -> Result<()> {
    info!(?mode, "Second factor required");
    match mode {
        TwoFactorMode::TrustedDevice => {
            let url = client
                .resolver()
                .resolve(&EndpointRef::Named(GsaEndpoint::TrustedDeviceSecondaryAuth))
                .await?;
            send(client, login, HttpRequest::new(Method::Get, url.as_str())).await?;

            let code = prompt.fetch_code().await.ok_or(Error::UserCancelled)?;
            let url = client
                .resolver()
                .resolve(&EndpointRef::Named(GsaEndpoint::ValidateCode))
                .await?;
            let request =
                HttpRequest::new(Method::Get, url.as_str()).header("security-code", code);
            validate(client, login, request).await
        }
        TwoFactorMode::Sms => {
            let phone_number_id = DEFAULT_PHONE_NUMBER_ID;
            let mut server_info = Dictionary::new();
            server_info.insert("phoneNumber.id".into(), Value::String(phone_number_id.into()));
            let mut body = Dictionary::new();
            body.insert("serverInfo".into(), Value::Dictionary(server_info.clone()));

            let url = literal(SMS_TRIGGER_URL, client).await?;
            let request = HttpRequest::new(Method::Post, url.as_str()).body(to_xml_bytes(body)?);
            send(client, login, request).await?;

            let code = prompt.fetch_code().await.ok_or(Error::UserCancelled)?;
            server_info.insert("mode".into(), Value::String("sms".into()));
            let mut body = Dictionary::new();
            body.insert("securityCode.code".into(), Value::String(code));
            body.insert("serverInfo".into(), Value::Dictionary(server_info));

            let url = literal(SMS_VALIDATE_URL, client).await?;
            let request = HttpRequest::new(Method::Post, url.as_str()).body(to_xml_bytes(body)?);
            validate(client, login, request).await
        }
    }
}

async fn literal(raw: &str, client: &GsaClient) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::decode("two-factor URL", e))?;
    client.resolver().resolve(&EndpointRef::Url(url)).await
}

async fn validate(client: &GsaClient, login: &LoginData, request: HttpRequest) -> Result<()> {
    match send(client, login, request).await {
        Err(Error::Operation(OperationError { code, .. }))
            if code == OperationError::INCORRECT_VERIFICATION_CODE =>
        {
            Err(Error::IncorrectVerificationCode)
        }
        Err(other) => Err(other),
        Ok(()) => {
            info!("Verification code accepted");
            Ok(())
        }
    }
}

async fn send(client: &GsaClient, login: &LoginData, request: HttpRequest) -> Result<()> {
    let url = request.url.clone();
    let request = request
        .header("Accept", "application/x-buddyml")
        .header("Content-Type", "application/x-plist")
        .header("X-Apple-App-Info", APP_INFO)
        .header(XCODE_VERSION_HEADER, XCODE_VERSION)
        .header("X-Apple-Identity-Token", login.identity_token());
    debug!(url = %url, "Sending two-factor request");
    let response = client.send_raw(request).await?;
    check_response(response, &url)
}

/// Replies are free-form; only a status envelope, when present, is
/// authoritative.
fn check_response(response: HttpResponse, url: &str) -> Result<()> {
    if let Ok(root) = parse_dictionary(&response.body, "two-factor response") {
        let status = root
            .get("Status")
            .and_then(Value::as_dictionary)
            .unwrap_or(&root);
        if let Some(code) = status.optional_integer("ec") {
            if code != 0 {
                let message = status.optional_string("em").unwrap_or_default();
                return Err(OperationError::new(code, message).into());
            }
            return Ok(());
        }
    }
    response.error_for_status(url).map(|_| ())
}
