// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RSA signing key and certificate signing request.

use rand::rngs::OsRng;
use rcgen::{CertificateParams, DistinguishedName, DnType, PKCS_RSA_SHA256};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

const KEY_BITS: usize = 2048;
const CSR_COMMON_NAME: &str = "XTool Development";

/// Private key backing a development certificate.
#[derive(Clone)]
pub struct Keypair {
    key: RsaPrivateKey,
}

impl Keypair {
    pub fn generate() -> Result<Self> {
        let key = RsaPrivateKey::new(&mut OsRng, KEY_BITS).map_err(crypto)?;
        Ok(Self { key })
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem).map_err(crypto)?;
        Ok(Self { key })
    }

    pub fn private_key_pem(&self) -> Result<Zeroizing<String>> {
        let pem = self.key.to_pkcs8_pem(LineEnding::LF).map_err(crypto)?;
        Ok(Zeroizing::new(pem.as_str().to_owned()))
    }

    /// PEM-encoded PKCS#10 request signed with this key.
    pub fn csr_pem(&self) -> Result<String> {
        let pem = self.private_key_pem()?;
        let signer =
            rcgen::KeyPair::from_pkcs8_pem_and_sign_algo(&pem, &PKCS_RSA_SHA256).map_err(crypto)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, CSR_COMMON_NAME);
        params.distinguished_name.push(DnType::CountryName, "US");

        let request = params.serialize_request(&signer).map_err(crypto)?;
        request.pem().map_err(crypto)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair").finish_non_exhaustive()
    }
}

fn crypto(e: impl std::fmt::Display) -> Error {
    Error::Crypto(e.to_string())
}
