// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GSA Provisioner - Account Login & Signing Credential Reconciliation
//!
//! Logs an Apple ID in through the GrandSlam SRP handshake (with two-factor
//! escalation) and keeps the development certificate, app IDs, app groups
//! and provisioning profiles an app bundle needs in sync with developer
//! services.
//!
//! ## Modules
//!
//! - `srp` - SRP-6a client and session payload decryption
//! - `gsa` - GrandSlam transport, login state machine, two-factor, app tokens
//! - `developer` - developer-services client (JSON:API and legacy plist)
//! - `provisioning` - certificate, app ID, app group and profile reconciliation
//! - `credentials` - signing key, certificate and their persistence
//! - `entitlements` - typed entitlements that keep unknown keys verbatim
//! - `storage` - key/value persistence backends
//! - `anisette`, `http`, `signer` - seams to external collaborators

pub mod anisette;
pub mod config;
pub mod credentials;
pub mod developer;
pub mod entitlements;
pub mod error;
pub mod gsa;
pub mod http;
pub mod identifiers;
pub mod provisioning;
pub mod signer;
pub mod srp;
pub mod storage;
pub mod telemetry;

mod plist_ext;

pub use anisette::{AnisetteData, AnisetteProvider, DeviceInfo, StaticAnisetteProvider};
pub use config::ClientConfig;
pub use credentials::{Certificate, CredentialSet, CredentialStore, Keypair};
pub use developer::{DeveloperServices, DeveloperServicesClient, Team};
pub use entitlements::{Entitlement, Entitlements};
pub use error::{Error, Result};
pub use gsa::{DeveloperLoginToken, GsaClient, LoginManager, SecondFactorPrompt};
pub use provisioning::{
    Provisioner, ProvisioningContext, ProvisioningInfo, ProvisioningOutcome,
    RevocationConfirmation, TargetDevice,
};
pub use signer::SigningEngine;
pub use storage::{DirectoryStorage, KeyValueStorage, MemoryStorage};
