// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Code-signing engine seam.
//!
//! Binary patching lives outside this crate. Provisioning only needs the
//! entitlements an executable already declares, and hands the signer the
//! credential plus the rewritten entitlements of every bundle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Progress callback taking a fraction in `0.0..=1.0`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

#[async_trait]
pub trait SigningEngine: Send + Sync {
    /// Sign the bundle at `app_path` and every nested bundle listed in
    /// `entitlements_by_path` (XML plist bytes keyed by bundle path).
    async fn sign(
        &self,
        app_path: &Path,
        certificate_der: &[u8],
        private_key_pem: &str,
        entitlements_by_path: &HashMap<PathBuf, Vec<u8>>,
        progress: ProgressFn<'_>,
    ) -> Result<()>;

    /// Entitlements blob embedded in `executable`, if it has one.
    async fn analyze_entitlements(&self, executable: &Path) -> Result<Option<Vec<u8>>>;
}
