// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-app token exchange (`o = apptokens`).
//!
//! The request is authenticated by `HMAC-SHA256(sk, "apptokens" | adsid |
//! app...)`. The reply's `et` blob is AES-256-GCM under `sk` with a 16-byte
//! nonce, laid out as `aad(3) | nonce(16) | ciphertext | tag(16)`.

use std::collections::HashMap;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{aes::Aes256, AesGcm, Nonce};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use super::auth::LoginData;
use super::request::GsaRequest;
use super::GsaClient;
use crate::error::{Error, ProtocolError, Result};
use crate::plist_ext::{parse_dictionary, DictionaryExt};

/// App key for the developer-services token.
pub const XCODE_APP: &str = "com.apple.gs.xcode.auth";

const AAD_LEN: usize = 3;
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// A token scoped to one app.
#[derive(Clone, PartialEq, Eq)]
pub struct AppToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl std::fmt::Debug for AppToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppToken")
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// Fetch tokens for `apps`. Apps the server did not issue a token for are
/// absent from the map.
pub async fn fetch_app_tokens(
    client: &GsaClient,
    apps: &[&str],
    login: &LoginData,
) -> Result<HashMap<String, AppToken>> {
    let apps: Vec<String> = apps.iter().map(|app| app.to_string()).collect();
    let checksum = checksum(&login.session_key, &login.adsid, &apps)?;

    debug!(apps = apps.len(), "Requesting app tokens");
    let response = client
        .send(GsaRequest::AppTokens {
            adsid: login.adsid.clone(),
            apps,
            cookie: login.cookie.clone(),
            idms_token: login.idms_token.clone(),
            checksum,
        })
        .await?
        .into_app_tokens()?;

    let plaintext = decrypt_tokens(&response.encrypted_tokens, &login.session_key)?;
    let payload = parse_dictionary(&plaintext, "app tokens")?;
    let table = payload.required_dictionary("t")?;

    let mut tokens = HashMap::with_capacity(table.len());
    for (app, entry) in table {
        let entry = entry
            .as_dictionary()
            .ok_or_else(|| Error::decode("app token", "entry is not a dictionary"))?;
        let expiry_ms = entry.required_integer("expiry")?;
        let expiry = DateTime::<Utc>::from_timestamp_millis(expiry_ms)
            .ok_or_else(|| Error::decode("app token", "expiry out of range"))?;
        tokens.insert(
            app.clone(),
            AppToken {
                token: entry.required_string("token")?.to_string(),
                expiry,
            },
        );
    }
    Ok(tokens)
}

pub(crate) fn checksum(session_key: &[u8], adsid: &str, apps: &[String]) -> Result<Vec<u8>> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(session_key)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    mac.update(b"apptokens");
    mac.update(adsid.as_bytes());
    for app in apps {
        mac.update(app.as_bytes());
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

fn decrypt_tokens(sealed: &[u8], session_key: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < AAD_LEN + NONCE_LEN + TAG_LEN {
        return Err(ProtocolError::MissingField("et").into());
    }
    let (aad, rest) = sealed.split_at(AAD_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let cipher =
        Aes256Gcm16::new_from_slice(session_key).map_err(|e| Error::Crypto(e.to_string()))?;
    cipher
        .decrypt(
            Nonce::<U16>::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| ProtocolError::InvalidSession.into())
}
