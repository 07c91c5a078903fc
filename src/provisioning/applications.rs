// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! App ID and capability reconciliation for one bundle.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use super::app_groups::assign_app_groups;
use super::context::ProvisioningContext;
use super::profiles::issue_profile;
use super::ProvisioningInfo;
use crate::credentials::CredentialSet;
use crate::developer::{BundleId, CapabilitySetting, CapabilityType};
use crate::entitlements::Entitlements;
use crate::error::{ReconciliationError, Result};
use crate::identifiers::{app_name, identifier, sanitize};
use crate::plist_ext::{parse_dictionary, DictionaryExt};
use crate::signer::SigningEngine;

/// The app ID registered as exactly `identifier`, if any.
///
/// The remote filter is a prefix match, so `com.example.app` also returns
/// `com.example.app.widget`; only the exact match counts.
pub(crate) async fn find_bundle(
    ctx: &ProvisioningContext,
    identifier: &str,
) -> Result<Option<BundleId>> {
    let mut matches: Vec<BundleId> = ctx
        .services
        .find_bundle_ids(identifier)
        .await?
        .into_iter()
        .filter(|bundle| bundle.identifier == identifier)
        .collect();
    match matches.len() {
        0 | 1 => Ok(matches.pop()),
        _ => Err(ReconciliationError::TooManyMatchingBundleIds(identifier.to_string()).into()),
    }
}

/// Find or register the app ID for `bundle_identifier` and bring its
/// capabilities in line with `entitlements`.
pub async fn upsert_application(
    ctx: &ProvisioningContext,
    bundle_identifier: &str,
    entitlements: &Entitlements,
) -> Result<BundleId> {
    let sanitized = sanitize(bundle_identifier);
    let registered = identifier(&sanitized, &ctx.identity_id);

    let bundle = match find_bundle(ctx, &registered).await? {
        Some(bundle) => {
            debug!(identifier = %bundle.identifier, "App ID exists");
            bundle
        }
        None => {
            let bundle = ctx
                .services
                .create_bundle_id(&app_name(&sanitized), &registered)
                .await?;
            info!(identifier = %bundle.identifier, "Registered app ID");
            bundle
        }
    };

    let free = ctx.team.is_free();
    let desired: BTreeMap<CapabilityType, Vec<CapabilitySetting>> = entitlements
        .capabilities()
        .into_iter()
        .filter(|binding| !free || binding.is_free)
        .map(|binding| (binding.capability_type, binding.settings))
        .collect();

    let remote = ctx.services.list_capabilities(&bundle.id).await?;
    for capability in &remote {
        match desired.get(&capability.capability_type) {
            Some(settings) if !same_settings(settings, &capability.settings) => {
                ctx.services
                    .update_capability(&capability.id, &capability.capability_type, settings)
                    .await?;
                info!(capability = %capability.capability_type, "Updated capability");
            }
            Some(_) => {}
            None if capability.capability_type.is_removable() => {
                ctx.services.delete_capability(&capability.id).await?;
                info!(capability = %capability.capability_type, "Removed capability");
            }
            None => {
                debug!(capability = %capability.capability_type, "Keeping non-removable capability");
            }
        }
    }

    for (capability_type, settings) in &desired {
        if remote
            .iter()
            .any(|capability| capability.capability_type == *capability_type)
        {
            continue;
        }
        ctx.services
            .create_capability(&bundle.id, capability_type, settings)
            .await?;
        info!(capability = %capability_type, "Enabled capability");
    }

    Ok(bundle)
}

fn same_settings(desired: &[CapabilitySetting], remote: &[CapabilitySetting]) -> bool {
    desired.len() == remote.len() && desired.iter().all(|setting| remote.contains(setting))
}

/// Reconcile one bundle (app or extension) and issue its profile.
pub async fn provision_app(
    ctx: &ProvisioningContext,
    credential: &CredentialSet,
    signer: &dyn SigningEngine,
    bundle_path: &Path,
) -> Result<ProvisioningInfo> {
    let invalid_app = || ReconciliationError::InvalidApp(bundle_path.to_path_buf());

    let info_bytes = tokio::fs::read(bundle_path.join("Info.plist"))
        .await
        .map_err(|_| invalid_app())?;
    let info = parse_dictionary(&info_bytes, "Info.plist").map_err(|_| invalid_app())?;
    let bundle_identifier = info
        .optional_string("CFBundleIdentifier")
        .ok_or_else(invalid_app)?
        .to_string();
    let executable = info
        .optional_string("CFBundleExecutable")
        .ok_or_else(invalid_app)?;

    let mut entitlements = match signer
        .analyze_entitlements(&bundle_path.join(executable))
        .await
    {
        Ok(Some(blob)) => Entitlements::from_plist_bytes(&blob).unwrap_or_else(|e| {
            warn!(bundle = %bundle_identifier, error = %e, "Ignoring unreadable entitlements");
            Entitlements::new()
        }),
        Ok(None) => Entitlements::new(),
        Err(e) => {
            warn!(bundle = %bundle_identifier, error = %e, "Entitlement analysis failed");
            Entitlements::new()
        }
    };
    if ctx.team.is_free() {
        entitlements.retain_free();
    }

    let bundle = upsert_application(ctx, &bundle_identifier, &entitlements).await?;

    let team_id = credential.certificate.team_id().unwrap_or(&ctx.team.id);
    entitlements.update_team_and_bundle(team_id, &bundle.identifier);
    entitlements.force_get_task_allow();

    if let Some(groups) = entitlements.app_groups().filter(|groups| !groups.is_empty()) {
        let groups = groups.to_vec();
        let assigned = assign_app_groups(ctx, &bundle, &groups).await?;
        entitlements.set_app_groups(assigned);
    }

    let profile = issue_profile(ctx, &bundle.identifier, credential).await?;
    Ok(ProvisioningInfo {
        new_bundle_id: bundle.identifier,
        entitlements,
        profile,
    })
}
