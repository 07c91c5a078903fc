// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Development certificate reconciliation.
//!
//! | Local set | Remote record | Action |
//! |-----------|---------------|--------|
//! | none | any | revoke all (free teams, after confirmation), create |
//! | known | missing | revoke all (free teams, after confirmation), create |
//! | known | expired | revoke that record (free teams), create |
//! | known | valid | reuse, no mutation |

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::context::ProvisioningContext;
use super::task_group::TaskGroup;
use crate::credentials::{normalize_serial, Certificate, CredentialSet, Keypair};
use crate::developer::CertificateRecord;
use crate::error::{Error, ReconciliationError, Result};

/// Gate in front of revoking certificates the user may still be using.
#[async_trait]
pub trait RevocationConfirmation: Send + Sync {
    /// `true` to revoke `certificates`.
    async fn confirm_revocation(&self, certificates: &[CertificateRecord]) -> bool;
}

#[async_trait]
impl<F> RevocationConfirmation for F
where
    F: Fn(&[CertificateRecord]) -> bool + Send + Sync,
{
    async fn confirm_revocation(&self, certificates: &[CertificateRecord]) -> bool {
        self(certificates)
    }
}

/// Return a usable credential set for the context's identity, creating
/// (and revoking) remote certificates as needed.
pub async fn ensure_credential(
    ctx: &ProvisioningContext,
    confirm: &dyn RevocationConfirmation,
) -> Result<CredentialSet> {
    let mut remote = ctx.services.list_certificates().await?;
    debug!(count = remote.len(), "Fetched development certificates");

    let (stale, needs_confirmation) = match ctx.store.load(&ctx.identity_id)? {
        None => (remote, true),
        Some(known) => {
            let serial = known.certificate.serial_number();
            match remote
                .iter()
                .position(|record| normalize_serial(&record.serial_number) == serial)
            {
                Some(index) if !remote[index].is_expired(Utc::now()) => {
                    debug!(serial, "Stored certificate is still valid");
                    return Ok(known);
                }
                Some(index) => {
                    info!(serial, "Stored certificate expired");
                    (vec![remote.swap_remove(index)], false)
                }
                None => {
                    info!(serial, "Stored certificate is no longer registered");
                    (remote, true)
                }
            }
        }
    };

    if ctx.team.is_free() && !stale.is_empty() {
        if needs_confirmation && !confirm.confirm_revocation(&stale).await {
            return Err(Error::UserCancelled);
        }
        revoke_all(ctx, stale).await?;
    }

    create_credential(ctx).await
}

async fn revoke_all(ctx: &ProvisioningContext, certificates: Vec<CertificateRecord>) -> Result<()> {
    ctx.check_cancelled()?;
    let mut group = TaskGroup::new(&ctx.cancellation);
    for certificate in certificates {
        let ctx = ctx.with_cancellation(group.token());
        group.spawn(async move {
            ctx.check_cancelled()?;
            ctx.services.revoke_certificate(&certificate.id).await?;
            info!(serial = %certificate.serial_number, "Revoked certificate");
            Ok(())
        });
    }
    group.join().await.map(|_| ())
}

async fn create_credential(ctx: &ProvisioningContext) -> Result<CredentialSet> {
    let keypair = tokio::task::spawn_blocking(Keypair::generate)
        .await
        .map_err(|e| Error::Crypto(e.to_string()))??;
    let csr = keypair.csr_pem()?;

    let record = ctx.services.create_certificate(&csr).await?;
    let der = record.content.ok_or(ReconciliationError::CsrFailed)?;
    let set = CredentialSet {
        private_key_pem: keypair.private_key_pem()?,
        certificate: Certificate::from_der(der)?,
    };
    ctx.store.save(&ctx.identity_id, &set)?;

    info!(
        serial = set.certificate.serial_number(),
        expiry = %set.certificate.expiry(),
        "Created development certificate"
    );
    Ok(set)
}
