// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login handshake state machine.
//!
//! `init` → `complete` → either a finished session or a second-factor
//! challenge. After a successful second factor the handshake starts over
//! with a new [`SrpClient`] and transcript; a second challenge on the
//! restarted handshake is [`Error::FailedSecondaryAuth`].

use std::fmt;

use base64ct::{Base64, Encoding};
use plist::Dictionary;
use tracing::info;
use zeroize::Zeroizing;

use super::request::{CompleteResponse, GsaRequest};
use super::two_factor::{self, SecondFactorPrompt, TwoFactorMode};
use super::GsaClient;
use crate::error::{Error, ProtocolError, Result};
use crate::plist_ext::{parse_dictionary, DictionaryExt};
use crate::srp::{PasswordProtocol, SrpClient, Transcript};

const STATUS_SECOND_FACTOR: i64 = 409;

/// Session material decrypted from the `complete` reply.
#[derive(Clone)]
pub struct LoginData {
    pub adsid: String,
    pub idms_token: String,
    pub session_key: Zeroizing<Vec<u8>>,
    pub cookie: Vec<u8>,
}

impl LoginData {
    fn from_payload(payload: &Dictionary) -> std::result::Result<Self, ProtocolError> {
        Ok(Self {
            adsid: payload.required_string("adsid")?.to_string(),
            idms_token: payload.required_string("GsIdmsToken")?.to_string(),
            session_key: Zeroizing::new(payload.required_data("sk")?.to_vec()),
            cookie: payload.required_data("c")?.to_vec(),
        })
    }

    /// `X-Apple-Identity-Token` value: base64 of `adsid:token`.
    pub fn identity_token(&self) -> String {
        Base64::encode_string(format!("{}:{}", self.adsid, self.idms_token).as_bytes())
    }
}

impl fmt::Debug for LoginData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginData")
            .field("adsid", &self.adsid)
            .finish_non_exhaustive()
    }
}

enum Outcome {
    Complete(LoginData),
    SecondFactor { mode: TwoFactorMode, login: LoginData },
}

/// Drives the SRP login against GrandSlam.
#[derive(Debug, Clone)]
pub struct Authenticator {
    client: GsaClient,
}

impl Authenticator {
    pub fn new(client: GsaClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GsaClient {
        &self.client
    }

    /// Log in, escalating to a second factor when the server asks for one.
    ///
    /// `username` is used verbatim; callers normalize it.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        prompt: &dyn SecondFactorPrompt,
    ) -> Result<LoginData> {
        info!("GrandSlam login started");
        let (mode, login) = match self.attempt(username, password, SrpClient::new()).await? {
            Outcome::Complete(login) => {
                info!(adsid = %login.adsid, "GrandSlam login completed");
                return Ok(login);
            }
            Outcome::SecondFactor { mode, login } => (mode, login),
        };

        two_factor::verify(&self.client, mode, &login, prompt).await?;
        info!("Restarting handshake after second factor");

        match self.attempt(username, password, SrpClient::new()).await? {
            Outcome::Complete(login) => {
                info!(adsid = %login.adsid, "GrandSlam login completed");
                Ok(login)
            }
            Outcome::SecondFactor { .. } => Err(Error::FailedSecondaryAuth),
        }
    }

    /// One full handshake with its own exchange state and transcript.
    async fn attempt(
        &self,
        username: &str,
        password: &str,
        mut srp: SrpClient,
    ) -> Result<Outcome> {
        let mut transcript = Transcript::new();
        let offered: Vec<&str> = PasswordProtocol::SUPPORTED
            .iter()
            .map(|protocol| protocol.name())
            .collect();
        transcript.add_str(&offered.join(","));
        transcript.add_str("|");

        let init = self
            .client
            .send(GsaRequest::Init {
                username: username.to_string(),
                public_value: srp.public_value(),
            })
            .await?
            .into_init()?;

        transcript.add_str("|");
        transcript.add_str(init.protocol.name());

        let m1 = srp.process_challenge(
            username,
            password,
            &init.salt,
            init.iterations,
            init.protocol,
            &init.server_public,
        )?;

        let complete = self
            .client
            .send(GsaRequest::Complete {
                username: username.to_string(),
                cookie: init.cookie,
                m1,
            })
            .await?
            .into_complete()?;

        transcript.add_str("|");
        transcript.add_data(&complete.encrypted_payload);
        transcript.add_str("|");
        if let Some(continuation) = &complete.continuation {
            transcript.add_data(continuation);
        }
        transcript.add_str("|");

        if !srp.verify_server_evidence(&complete.m2)
            || !srp.verify_transcript(&transcript.digest(), &complete.negotiation_proof)
        {
            return Err(ProtocolError::InvalidSession.into());
        }

        let plaintext = srp.decrypt_session_payload(&complete.encrypted_payload)?;
        let payload = parse_dictionary(&plaintext, "login payload")?;
        let login = LoginData::from_payload(&payload)?;
        classify(&payload, &complete, login)
    }
}

/// Decide between a finished login and a second-factor challenge.
///
/// The decrypted payload's `status-code`/`url` take precedence over the
/// envelope's `hsc`/`au`.
fn classify(payload: &Dictionary, complete: &CompleteResponse, login: LoginData) -> Result<Outcome> {
    let status = payload
        .optional_integer("status-code")
        .or(complete.status_code)
        .unwrap_or(200);
    let url = payload
        .optional_string("url")
        .map(str::to_string)
        .or_else(|| complete.auth_url.clone());

    if status == STATUS_SECOND_FACTOR {
        if let Some(mode) = url.as_deref().and_then(TwoFactorMode::from_auth_url) {
            return Ok(Outcome::SecondFactor { mode, login });
        }
    }
    if (200..300).contains(&status) {
        return Ok(Outcome::Complete(login));
    }
    Err(ProtocolError::UnexpectedStatus {
        status,
        url: url.unwrap_or_default(),
    }
    .into())
}
