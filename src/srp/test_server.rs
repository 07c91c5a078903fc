// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server half of the exchange, used to drive the client in tests.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::{derive_password_key, hash_padded_pair, hmac_sha256, pad, PasswordProtocol, G, N};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;

pub(crate) struct TestSrpServer {
    username: String,
    salt: Vec<u8>,
    verifier: BigUint,
    private: BigUint,
    public: BigUint,
    key: Option<Vec<u8>>,
}

impl TestSrpServer {
    pub(crate) fn new(
        username: &str,
        password: &str,
        salt: &[u8],
        iterations: u32,
        protocol: PasswordProtocol,
    ) -> Self {
        let mut private = [0u8; 32];
        OsRng.fill_bytes(&mut private);
        Self::with_private_exponent(username, password, salt, iterations, protocol, &private)
    }

    pub(crate) fn with_private_exponent(
        username: &str,
        password: &str,
        salt: &[u8],
        iterations: u32,
        protocol: PasswordProtocol,
        private: &[u8],
    ) -> Self {
        let password_key = derive_password_key(password, salt, iterations, protocol);
        let inner = Sha256::new()
            .chain_update(b":")
            .chain_update(&*password_key)
            .finalize();
        let x = BigUint::from_bytes_be(&Sha256::new().chain_update(salt).chain_update(inner).finalize());
        let verifier = G.modpow(&x, &N);

        let k = hash_padded_pair(&N.to_bytes_be(), &G.to_bytes_be());
        let private = BigUint::from_bytes_be(private);
        let public = (&k * &verifier + G.modpow(&private, &N)) % &*N;

        Self {
            username: username.to_string(),
            salt: salt.to_vec(),
            verifier,
            private,
            public,
            key: None,
        }
    }

    pub(crate) fn public_value(&self) -> Vec<u8> {
        self.public.to_bytes_be()
    }

    /// Check the client's `M1`; returns `M2` when it matches.
    pub(crate) fn verify_client(&mut self, client_public: &[u8], m1: &[u8]) -> Option<Vec<u8>> {
        let a_pub = BigUint::from_bytes_be(client_public);
        let b_bytes = self.public_value();
        let u = hash_padded_pair(client_public, &b_bytes);
        let shared = (a_pub * self.verifier.modpow(&u, &N)).modpow(&self.private, &N);
        let key = Sha256::digest(shared.to_bytes_be()).to_vec();

        let g_hash = Sha256::digest(pad(&G.to_bytes_be()));
        let n_hash = Sha256::digest(N.to_bytes_be());
        let group_hash: Vec<u8> = g_hash.iter().zip(n_hash.iter()).map(|(l, r)| l ^ r).collect();
        let expected = Sha256::new()
            .chain_update(&group_hash)
            .chain_update(Sha256::digest(self.username.as_bytes()))
            .chain_update(&self.salt)
            .chain_update(client_public)
            .chain_update(&b_bytes)
            .chain_update(&key)
            .finalize()
            .to_vec();
        if expected != m1 {
            return None;
        }

        let m2 = Sha256::new()
            .chain_update(client_public)
            .chain_update(m1)
            .chain_update(&key)
            .finalize()
            .to_vec();
        self.key = Some(key);
        Some(m2)
    }

    pub(crate) fn session_key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub(crate) fn encrypt_payload(&self, plaintext: &[u8]) -> Vec<u8> {
        let key = self.key.as_deref().unwrap_or_default();
        let data_key = hmac_sha256(key, b"extra data key:").unwrap();
        let iv = hmac_sha256(key, b"extra data iv:").unwrap();
        Aes256CbcEnc::new_from_slices(&data_key, &iv[..16])
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    pub(crate) fn negotiation_proof(&self, transcript_digest: &[u8]) -> Vec<u8> {
        let key = self.key.as_deref().unwrap_or_default();
        let hmac_key = hmac_sha256(key, b"HMAC key:").unwrap();
        hmac_sha256(&hmac_key, transcript_digest).unwrap()
    }
}
