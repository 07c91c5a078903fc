// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Reconciliation
//!
//! Brings developer-services state in line with what an app bundle needs:
//!
//! 1. the target device is registered ([`devices`])
//! 2. a valid development certificate exists and its key is stored
//!    locally ([`certificates`])
//! 3. every bundle (the app plus its `PlugIns/*.appex` and
//!    `Extensions/*.appex`) has an app ID with matching capabilities, its
//!    app groups, and a fresh profile ([`applications`], [`app_groups`],
//!    [`profiles`])
//!
//! The remote service is the source of truth. Nothing is rolled back on
//! failure; every step is idempotent, so running the reconciliation again
//! converges.
//!
//! ## Cancellation
//!
//! [`ProvisioningContext::cancel`] is checked before each certificate
//! revocation and each profile deletion. A call already in flight runs to
//! completion.

pub mod app_groups;
pub mod applications;
pub mod certificates;
pub mod context;
pub mod devices;
pub mod profiles;
pub mod task_group;

pub use certificates::RevocationConfirmation;
pub use context::{ProvisioningContext, TargetDevice};
pub use profiles::Profile;
pub use task_group::TaskGroup;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::credentials::{CredentialSet, CredentialStore};
use crate::developer::{find_team, DeveloperServices};
use crate::entitlements::Entitlements;
use crate::error::Result;
use crate::signer::{ProgressFn, SigningEngine};

/// Nested bundle directories provisioned alongside the app.
const EXTENSION_DIRS: [&str; 2] = ["PlugIns", "Extensions"];
const EXTENSION_SUFFIX: &str = "appex";

/// Outcome for one bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningInfo {
    /// Identifier the bundle is registered under.
    pub new_bundle_id: String,
    /// Entitlements to sign the bundle with.
    pub entitlements: Entitlements,
    pub profile: Profile,
}

/// Credential and per-bundle results of one run.
#[derive(Debug, Clone)]
pub struct ProvisioningOutcome {
    pub credential: CredentialSet,
    pub bundles: HashMap<PathBuf, ProvisioningInfo>,
}

impl ProvisioningOutcome {
    /// Entitlements plist per bundle path, as the signing engine takes them.
    pub fn entitlements_by_path(&self) -> Result<HashMap<PathBuf, Vec<u8>>> {
        self.bundles
            .iter()
            .map(|(path, info)| Ok((path.clone(), info.entitlements.to_plist_bytes()?)))
            .collect()
    }
}

/// Runs the full reconciliation for an app bundle.
pub struct Provisioner {
    ctx: ProvisioningContext,
    signer: Arc<dyn SigningEngine>,
}

impl Provisioner {
    pub fn new(ctx: ProvisioningContext, signer: Arc<dyn SigningEngine>) -> Self {
        Self { ctx, signer }
    }

    /// Resolve `team_id` among the account's teams and build a provisioner
    /// for it.
    pub async fn connect(
        services: Arc<dyn DeveloperServices>,
        store: CredentialStore,
        identity_id: impl Into<String>,
        team_id: &str,
        device: TargetDevice,
        signer: Arc<dyn SigningEngine>,
    ) -> Result<Self> {
        let team = find_team(services.as_ref(), team_id).await?;
        info!(team_id = %team.id, free = team.is_free(), "Selected team");
        let ctx = ProvisioningContext::new(services, store, identity_id, team, device);
        Ok(Self::new(ctx, signer))
    }

    pub fn context(&self) -> &ProvisioningContext {
        &self.ctx
    }

    /// Register the device, ensure the credential, then reconcile the app
    /// and its extensions in parallel.
    pub async fn provision(
        &self,
        app_root: &Path,
        confirm: &dyn RevocationConfirmation,
        progress: ProgressFn<'_>,
    ) -> Result<ProvisioningOutcome> {
        progress(0.0);
        devices::ensure_device(&self.ctx).await?;

        progress(1.0 / 3.0);
        let credential = certificates::ensure_credential(&self.ctx, confirm).await?;

        progress(2.0 / 3.0);
        let paths = bundle_paths(app_root).await;
        debug!(count = paths.len(), "Provisioning bundles");

        let mut group = TaskGroup::new(&self.ctx.cancellation);
        for path in paths {
            let ctx = self.ctx.with_cancellation(group.token());
            let credential = credential.clone();
            let signer = Arc::clone(&self.signer);
            group.spawn(async move {
                let info =
                    applications::provision_app(&ctx, &credential, signer.as_ref(), &path).await?;
                Ok((path, info))
            });
        }
        let bundles = group.join().await?.into_iter().collect();

        progress(1.0);
        info!(app = %app_root.display(), "Provisioning complete");
        Ok(ProvisioningOutcome {
            credential,
            bundles,
        })
    }

    /// Hand a provisioned bundle to the signing engine.
    pub async fn sign(
        &self,
        app_root: &Path,
        outcome: &ProvisioningOutcome,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let entitlements = outcome.entitlements_by_path()?;
        self.signer
            .sign(
                app_root,
                outcome.credential.certificate.der(),
                &outcome.credential.private_key_pem,
                &entitlements,
                progress,
            )
            .await
    }
}

/// The app root followed by its extension bundles, sorted by path.
async fn bundle_paths(app_root: &Path) -> Vec<PathBuf> {
    let mut extensions = Vec::new();
    for dir in EXTENSION_DIRS {
        let Ok(mut entries) = tokio::fs::read_dir(app_root.join(dir)).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(EXTENSION_SUFFIX))
            {
                extensions.push(path);
            }
        }
    }
    extensions.sort();

    let mut paths = vec![app_root.to_path_buf()];
    paths.extend(extensions);
    paths
}
