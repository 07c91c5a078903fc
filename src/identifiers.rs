// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mapping between an app's own bundle identifiers and the identifiers
//! registered on the team.
//!
//! Registered identifiers are `XTL-<IDENTITY>.<sanitized>`, where
//! `IDENTITY` is the first dash-separated segment of the identity id. A
//! bundle that was already rewritten once sanitizes back to its original
//! identifier, so re-provisioning is stable.

const ID_PREFIX: &str = "XTL-";
const GROUP_PREFIX: &str = "group.";
const NAME_PREFIX: &str = "XTool ";

/// Strip a previously applied `XTL-<IDENTITY>.` prefix.
pub fn sanitize(identifier: &str) -> String {
    if !identifier.starts_with(ID_PREFIX) {
        return identifier.to_string();
    }
    identifier
        .split_once('.')
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_default()
}

/// Strip `group.` and then any `XTL-<IDENTITY>.` prefix.
pub fn sanitize_group(group: &str) -> String {
    sanitize(group.strip_prefix(GROUP_PREFIX).unwrap_or(group))
}

pub fn identifier(sanitized: &str, identity_id: &str) -> String {
    let scope = identity_id.split('-').next().unwrap_or_default().to_uppercase();
    format!("{ID_PREFIX}{scope}.{sanitized}")
}

pub fn group_identifier(sanitized: &str, identity_id: &str) -> String {
    format!("{GROUP_PREFIX}{}", identifier(sanitized, identity_id))
}

/// Display name for a registered app ID.
pub fn app_name(sanitized: &str) -> String {
    format!("{NAME_PREFIX}{}", sanitized.replace('.', " "))
}

pub fn group_name(sanitized: &str) -> String {
    format!("{NAME_PREFIX}group {}", sanitized.replace('.', " "))
}
