// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Developer-services login: authenticate, then trade the session for the
//! Xcode app token.

use chrono::{DateTime, Utc};
use tracing::info;

use super::app_tokens::{fetch_app_tokens, XCODE_APP};
use super::auth::Authenticator;
use super::two_factor::SecondFactorPrompt;
use super::GsaClient;
use crate::error::{ReconciliationError, Result};

/// Credentials accepted by developer services.
#[derive(Clone, PartialEq, Eq)]
pub struct DeveloperLoginToken {
    pub adsid: String,
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl DeveloperLoginToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

impl std::fmt::Debug for DeveloperLoginToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeveloperLoginToken")
            .field("adsid", &self.adsid)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct LoginManager {
    authenticator: Authenticator,
}

impl LoginManager {
    pub fn new(client: GsaClient) -> Self {
        Self {
            authenticator: Authenticator::new(client),
        }
    }

    /// Log in as `username` (case-insensitive) and return the developer
    /// services token.
    pub async fn log_in(
        &self,
        username: &str,
        password: &str,
        prompt: &dyn SecondFactorPrompt,
    ) -> Result<DeveloperLoginToken> {
        let username = username.trim().to_lowercase();
        let login = self
            .authenticator
            .authenticate(&username, password, prompt)
            .await?;

        let mut tokens =
            fetch_app_tokens(self.authenticator.client(), &[XCODE_APP], &login).await?;
        let token = tokens
            .remove(XCODE_APP)
            .ok_or(ReconciliationError::MissingLoginToken)?;

        info!(adsid = %login.adsid, expiry = %token.expiry, "Developer services token issued");
        Ok(DeveloperLoginToken {
            adsid: login.adsid.clone(),
            token: token.token,
            expiry: token.expiry,
        })
    }
}
