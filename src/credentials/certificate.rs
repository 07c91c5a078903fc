// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Parsed development certificate.

use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

use crate::error::{Error, Result};

const PEM_TAG: &str = "CERTIFICATE";

/// DER certificate with the fields reconciliation needs.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    serial_number: String,
    team_id: Option<String>,
    common_name: Option<String>,
    expiry: DateTime<Utc>,
}

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der = der.into();
        let (_, parsed) =
            X509Certificate::from_der(&der).map_err(|e| Error::Crypto(format!("{e:?}")))?;

        let subject = parsed.subject();
        let team_id = subject
            .iter_organizational_unit()
            .find_map(|attribute| attribute.as_str().ok())
            .map(str::to_string);
        let common_name = subject
            .iter_common_name()
            .find_map(|attribute| attribute.as_str().ok())
            .map(str::to_string);
        let expiry = DateTime::<Utc>::from_timestamp(parsed.validity().not_after.timestamp(), 0)
            .ok_or_else(|| Error::Crypto("certificate expiry out of range".into()))?;
        let serial_number =
            normalize_serial(&hex::encode_upper(parsed.tbs_certificate.raw_serial()));

        Ok(Self {
            der,
            serial_number,
            team_id,
            common_name,
            expiry,
        })
    }

    /// Parse a single PEM `CERTIFICATE` block.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let block = ::pem::parse(pem).map_err(|e| Error::Crypto(format!("invalid PEM: {e}")))?;
        if block.tag() != PEM_TAG {
            return Err(Error::Crypto(format!("unexpected PEM block `{}`", block.tag())));
        }
        Self::from_der(block.into_contents())
    }

    pub fn to_pem(&self) -> String {
        ::pem::encode(&::pem::Pem::new(PEM_TAG, self.der.clone()))
    }

    /// Upper-case hex without leading zeros, the form developer services
    /// reports.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Team identifier from the subject OU.
    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("serial_number", &self.serial_number)
            .field("team_id", &self.team_id)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// Canonical serial form used for comparisons with remote records.
pub fn normalize_serial(serial: &str) -> String {
    serial.trim().trim_start_matches('0').to_ascii_uppercase()
}
