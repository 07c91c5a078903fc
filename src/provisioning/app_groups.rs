// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! App group upsert and assignment.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info};

use super::context::ProvisioningContext;
use super::task_group::TaskGroup;
use crate::developer::{AppGroup, BundleId};
use crate::error::Result;
use crate::identifiers::{group_identifier, group_name, sanitize_group};

/// Make sure every requested group exists on the team and is assigned to
/// `bundle`. Returns the registered group identifiers, in request order.
pub async fn assign_app_groups(
    ctx: &ProvisioningContext,
    bundle: &BundleId,
    requested: &[String],
) -> Result<Vec<String>> {
    let existing: HashMap<String, AppGroup> = ctx
        .services
        .list_app_groups()
        .await?
        .into_iter()
        .map(|group| (sanitize_group(&group.identifier), group))
        .collect();
    let existing = Arc::new(existing);

    let mut seen = BTreeSet::new();
    let mut group_tasks = TaskGroup::new(&ctx.cancellation);
    for sanitized in requested.iter().map(|group| sanitize_group(group)) {
        if !seen.insert(sanitized.clone()) {
            continue;
        }
        let ctx = ctx.with_cancellation(group_tasks.token());
        let existing = Arc::clone(&existing);
        let bundle_id = bundle.id.clone();
        group_tasks.spawn(async move {
            let group = match existing.get(&sanitized) {
                Some(group) => {
                    debug!(identifier = %group.identifier, "App group exists");
                    group.clone()
                }
                None => {
                    let identifier = group_identifier(&sanitized, &ctx.identity_id);
                    let group = ctx
                        .services
                        .create_app_group(&group_name(&sanitized), &identifier)
                        .await?;
                    info!(identifier = %group.identifier, "Created app group");
                    group
                }
            };
            ctx.services.assign_app_group(&bundle_id, &group.id).await?;
            Ok(group.identifier)
        });
    }
    group_tasks.join().await
}
