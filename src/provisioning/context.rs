// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Everything one provisioning run needs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialStore;
use crate::developer::{DeveloperServices, Team};
use crate::error::{Error, Result};

/// Target device of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDevice {
    pub name: String,
    pub udid: String,
}

/// Shared state for one provisioning run. Cheap to clone into sibling
/// tasks.
#[derive(Clone)]
pub struct ProvisioningContext {
    pub services: Arc<dyn DeveloperServices>,
    pub store: CredentialStore,
    /// Identity the credential set is stored under.
    pub identity_id: String,
    pub team: Team,
    pub device: TargetDevice,
    pub cancellation: CancellationToken,
}

impl ProvisioningContext {
    pub fn new(
        services: Arc<dyn DeveloperServices>,
        store: CredentialStore,
        identity_id: impl Into<String>,
        team: Team,
        device: TargetDevice,
    ) -> Self {
        Self {
            services,
            store,
            identity_id: identity_id.into(),
            team,
            device,
            cancellation: CancellationToken::new(),
        }
    }

    /// Copy of this context observing `token` instead.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancellation: token,
            ..self.clone()
        }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Fails with [`Error::Cancelled`] once the run was cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProvisioningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningContext")
            .field("identity_id", &self.identity_id)
            .field("team", &self.team.id)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
