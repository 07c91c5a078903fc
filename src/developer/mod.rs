// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Developer services: the remote source of truth for certificates,
//! devices, app IDs, capabilities, app groups and profiles.
//!
//! Reconciliation code only talks to the [`DeveloperServices`] trait;
//! [`DeveloperServicesClient`] is the HTTP implementation.

pub mod client;
pub mod models;

#[cfg(test)]
pub(crate) mod mock;

pub use client::DeveloperServicesClient;
pub use models::{
    AppGroup, BundleId, Capability, CapabilityOption, CapabilitySetting, CapabilityType,
    CertificateRecord, Device, DeviceRegistration, Membership, ProfileRecord, Team,
};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ReconciliationError, Result};

/// Remote developer-services operations used by reconciliation.
///
/// Every call is scoped to the team the implementation was built for,
/// except [`list_teams`](Self::list_teams).
#[async_trait]
pub trait DeveloperServices: Send + Sync {
    async fn list_teams(&self) -> Result<Vec<Team>>;

    /// Development certificates of the team.
    async fn list_certificates(&self) -> Result<Vec<CertificateRecord>>;
    async fn create_certificate(&self, csr_pem: &str) -> Result<CertificateRecord>;
    async fn revoke_certificate(&self, id: &str) -> Result<()>;

    async fn list_devices(&self) -> Result<Vec<Device>>;
    async fn register_device(&self, name: &str, udid: &str) -> Result<DeviceRegistration>;

    /// App IDs whose identifier starts with `identifier`, with their profile
    /// ids. The service filter is a prefix match; callers compare exactly.
    async fn find_bundle_ids(&self, identifier: &str) -> Result<Vec<BundleId>>;
    async fn create_bundle_id(&self, name: &str, identifier: &str) -> Result<BundleId>;

    async fn list_capabilities(&self, bundle_id: &str) -> Result<Vec<Capability>>;
    async fn create_capability(
        &self,
        bundle_id: &str,
        capability_type: &CapabilityType,
        settings: &[CapabilitySetting],
    ) -> Result<Capability>;
    async fn update_capability(
        &self,
        capability_id: &str,
        capability_type: &CapabilityType,
        settings: &[CapabilitySetting],
    ) -> Result<()>;
    async fn delete_capability(&self, capability_id: &str) -> Result<()>;

    async fn delete_profile(&self, profile_id: &str) -> Result<()>;
    async fn create_profile(
        &self,
        name: &str,
        bundle_id: &str,
        certificate_ids: &[String],
        device_ids: &[String],
    ) -> Result<ProfileRecord>;

    async fn list_app_groups(&self) -> Result<Vec<AppGroup>>;
    async fn create_app_group(&self, name: &str, identifier: &str) -> Result<AppGroup>;
    async fn assign_app_group(&self, bundle_id: &str, group_id: &str) -> Result<()>;
}

/// Look up `team_id` among the account's teams.
pub async fn find_team(services: &dyn DeveloperServices, team_id: &str) -> Result<Team> {
    let teams = services.list_teams().await?;
    debug!(count = teams.len(), "Fetched teams");
    teams
        .into_iter()
        .find(|team| team.id == team_id)
        .ok_or_else(|| ReconciliationError::TeamNotFound(team_id.to_string()).into())
}
