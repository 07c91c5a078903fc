// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GrandSlam operation requests and their decoded replies.
//!
//! Every operation shares one envelope:
//!
//! ```text
//! { Header: { Version: "1.0.1" },
//!   Request: { o: <operation>, u: <account>, cpd: { ...client data }, ...params } }
//! ```
//!
//! and one reply shape, `{ Response: { Status: { ec, em }, ...payload } }`.
//! [`GsaRequest`] is the closed set of operations; each variant builds its
//! own parameters and decodes its own [`GsaResponse`].

use plist::{Dictionary, Value};

use crate::anisette::{AnisetteData, DeviceInfo};
use crate::error::{OperationError, ProtocolError, Result};
use crate::plist_ext::DictionaryExt;
use crate::srp::PasswordProtocol;

const ENVELOPE_VERSION: &str = "1.0.1";

/// A GrandSlam operation.
#[derive(Debug, Clone)]
pub enum GsaRequest {
    /// First handshake round: offered protocols and the client public value.
    Init {
        username: String,
        public_value: Vec<u8>,
    },
    /// Second handshake round: the client evidence `M1`.
    Complete {
        username: String,
        cookie: String,
        m1: Vec<u8>,
    },
    /// Exchange an authenticated session for per-app tokens.
    AppTokens {
        adsid: String,
        apps: Vec<String>,
        cookie: Vec<u8>,
        idms_token: String,
        checksum: Vec<u8>,
    },
}

impl GsaRequest {
    /// Value of the `o` field.
    pub fn operation(&self) -> &'static str {
        match self {
            GsaRequest::Init { .. } => "init",
            GsaRequest::Complete { .. } => "complete",
            GsaRequest::AppTokens { .. } => "apptokens",
        }
    }

    /// Value of the `u` field.
    pub fn account(&self) -> &str {
        match self {
            GsaRequest::Init { username, .. } | GsaRequest::Complete { username, .. } => username,
            GsaRequest::AppTokens { adsid, .. } => adsid,
        }
    }

    fn parameters(&self) -> Dictionary {
        let mut params = Dictionary::new();
        match self {
            GsaRequest::Init { public_value, .. } => {
                let offered = PasswordProtocol::SUPPORTED
                    .iter()
                    .map(|protocol| Value::String(protocol.name().to_string()))
                    .collect();
                params.insert("ps".into(), Value::Array(offered));
                params.insert("A2k".into(), Value::Data(public_value.clone()));
            }
            GsaRequest::Complete { cookie, m1, .. } => {
                params.insert("c".into(), Value::String(cookie.clone()));
                params.insert("M1".into(), Value::Data(m1.clone()));
            }
            GsaRequest::AppTokens {
                apps,
                cookie,
                idms_token,
                checksum,
                ..
            } => {
                let apps = apps.iter().cloned().map(Value::String).collect();
                params.insert("app".into(), Value::Array(apps));
                params.insert("c".into(), Value::Data(cookie.clone()));
                params.insert("t".into(), Value::String(idms_token.clone()));
                params.insert("checksum".into(), Value::Data(checksum.clone()));
            }
        }
        params
    }

    /// Full request envelope with device and attestation client data.
    pub fn envelope(&self, device: &DeviceInfo, anisette: &AnisetteData) -> Dictionary {
        let mut client_data = Dictionary::new();
        client_data.insert("bootstrap".into(), Value::Boolean(true));
        client_data.insert("icscrec".into(), Value::Boolean(true));
        client_data.insert("pbe".into(), Value::Boolean(false));
        client_data.insert("prkgen".into(), Value::Boolean(true));
        client_data.insert("svct".into(), Value::String("iCloud".into()));
        client_data.insert("loc".into(), Value::String(anisette.locale.clone()));
        for (key, value) in device.headers().into_iter().chain(anisette.headers()) {
            client_data.insert(key, Value::String(value));
        }

        let mut request = Dictionary::new();
        request.insert("o".into(), Value::String(self.operation().into()));
        request.insert("u".into(), Value::String(self.account().into()));
        request.insert("cpd".into(), Value::Dictionary(client_data));
        for (key, value) in self.parameters() {
            request.insert(key, value);
        }

        let mut header = Dictionary::new();
        header.insert("Version".into(), Value::String(ENVELOPE_VERSION.into()));

        let mut envelope = Dictionary::new();
        envelope.insert("Header".into(), Value::Dictionary(header));
        envelope.insert("Request".into(), Value::Dictionary(request));
        envelope
    }

    /// Decode the `Response` payload. Status must already be checked.
    pub(crate) fn decode(&self, payload: &Dictionary) -> Result<GsaResponse> {
        let response = match self {
            GsaRequest::Init { .. } => GsaResponse::Init(InitResponse {
                protocol: PasswordProtocol::from_name(payload.required_string("sp")?)?,
                cookie: payload.required_string("c")?.to_string(),
                salt: payload.required_data("s")?.to_vec(),
                iterations: u32::try_from(payload.required_integer("i")?)
                    .map_err(|_| ProtocolError::ChallengeFailed)?,
                server_public: payload.required_data("B")?.to_vec(),
            }),
            GsaRequest::Complete { .. } => {
                let status = payload.required_dictionary("Status")?;
                GsaResponse::Complete(CompleteResponse {
                    m2: payload.required_data("M2")?.to_vec(),
                    encrypted_payload: payload.required_data("spd")?.to_vec(),
                    negotiation_proof: payload.required_data("np")?.to_vec(),
                    continuation: payload.optional_data("sc").map(<[u8]>::to_vec),
                    status_code: status.optional_integer("hsc"),
                    auth_url: status.optional_string("au").map(str::to_string),
                })
            }
            GsaRequest::AppTokens { .. } => GsaResponse::AppTokens(AppTokensResponse {
                encrypted_tokens: payload.required_data("et")?.to_vec(),
            }),
        };
        Ok(response)
    }
}

/// Reply to [`GsaRequest::Init`].
#[derive(Debug, Clone)]
pub struct InitResponse {
    pub protocol: PasswordProtocol,
    pub cookie: String,
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub server_public: Vec<u8>,
}

/// Reply to [`GsaRequest::Complete`].
#[derive(Debug, Clone)]
pub struct CompleteResponse {
    pub m2: Vec<u8>,
    /// `spd`, encrypted under the session key.
    pub encrypted_payload: Vec<u8>,
    /// `np`, the negotiated-protocol proof.
    pub negotiation_proof: Vec<u8>,
    /// `sc`, present on some continuations.
    pub continuation: Option<Vec<u8>>,
    /// `Status.hsc`
    pub status_code: Option<i64>,
    /// `Status.au`
    pub auth_url: Option<String>,
}

/// Reply to [`GsaRequest::AppTokens`].
#[derive(Debug, Clone)]
pub struct AppTokensResponse {
    /// `et`, AES-GCM sealed under `sk`.
    pub encrypted_tokens: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum GsaResponse {
    Init(InitResponse),
    Complete(CompleteResponse),
    AppTokens(AppTokensResponse),
}

impl GsaResponse {
    pub fn into_init(self) -> std::result::Result<InitResponse, ProtocolError> {
        match self {
            GsaResponse::Init(response) => Ok(response),
            _ => Err(ProtocolError::UnexpectedResponse("init")),
        }
    }

    pub fn into_complete(self) -> std::result::Result<CompleteResponse, ProtocolError> {
        match self {
            GsaResponse::Complete(response) => Ok(response),
            _ => Err(ProtocolError::UnexpectedResponse("complete")),
        }
    }

    pub fn into_app_tokens(self) -> std::result::Result<AppTokensResponse, ProtocolError> {
        match self {
            GsaResponse::AppTokens(response) => Ok(response),
            _ => Err(ProtocolError::UnexpectedResponse("apptokens")),
        }
    }
}

/// Return the `Response` dictionary after checking its `Status`.
pub(crate) fn unwrap_status(mut root: Dictionary) -> Result<Dictionary> {
    let payload = match root.remove("Response") {
        Some(Value::Dictionary(payload)) => payload,
        _ => return Err(ProtocolError::MissingField("Response").into()),
    };
    check_status(&payload)?;
    Ok(payload)
}

/// Fail with [`OperationError`] when `Status.ec` is non-zero.
pub(crate) fn check_status(payload: &Dictionary) -> Result<()> {
    let status = payload.required_dictionary("Status")?;
    let code = status.required_integer("ec")?;
    if code != 0 {
        let message = status.optional_string("em").unwrap_or_default();
        return Err(OperationError::new(code, message).into());
    }
    Ok(())
}
