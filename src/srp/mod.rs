// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SRP-6a client for the GrandSlam login handshake.
//!
//! Pure computation, no I/O. One [`SrpClient`] lives for exactly one
//! handshake attempt; a restart after two-factor verification builds a new
//! one.
//!
//! ## Construction
//!
//! - Group: RFC 5054 2048-bit, `g = 2`
//! - `k = H(pad(N) | pad(g))`, `u = H(pad(A) | pad(B))`
//! - `x = H(salt | H(":" | PBKDF2-SHA256(P', salt, iterations)))` where `P'`
//!   is `SHA256(password)` for `s2k` and its lower-case hex for `s2k_fo`.
//!   The username does not enter `x`.
//! - `K = H(S)`, `M1 = H(H(g) ^ H(N) | H(I) | salt | A | B | K)`,
//!   `HAMK = H(A | M1 | K)`
//! - Session sub-keys are `HMAC-SHA256(K, label)`.

mod group;
mod transcript;

#[cfg(test)]
pub(crate) mod test_server;

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

pub use group::{pad, GROUP_WIDTH, G, N};
pub use transcript::Transcript;

use crate::error::ProtocolError;

type HmacSha256 = Hmac<Sha256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const PRIVATE_EXPONENT_BYTES: usize = 32;

const HMAC_KEY_LABEL: &str = "HMAC key:";
const EXTRA_DATA_KEY_LABEL: &str = "extra data key:";
const EXTRA_DATA_IV_LABEL: &str = "extra data iv:";

/// Password-hashing variant negotiated by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordProtocol {
    /// `s2k`: PBKDF2 over the raw SHA-256 digest of the password.
    S2k,
    /// `s2k_fo`: PBKDF2 over the hex-encoded digest.
    S2kFo,
}

impl PasswordProtocol {
    /// Protocols offered in the `init` request, in offer order.
    pub const SUPPORTED: [PasswordProtocol; 2] = [PasswordProtocol::S2k, PasswordProtocol::S2kFo];

    pub fn name(self) -> &'static str {
        match self {
            PasswordProtocol::S2k => "s2k",
            PasswordProtocol::S2kFo => "s2k_fo",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ProtocolError> {
        match name {
            "s2k" => Ok(PasswordProtocol::S2k),
            "s2k_fo" => Ok(PasswordProtocol::S2kFo),
            other => Err(ProtocolError::UnsupportedProtocol(other.to_string())),
        }
    }

    pub fn is_legacy(self) -> bool {
        matches!(self, PasswordProtocol::S2kFo)
    }
}

/// Key material derived by a processed challenge.
struct Session {
    key: Zeroizing<Vec<u8>>,
    expected_m2: Vec<u8>,
}

/// Client half of one SRP exchange.
pub struct SrpClient {
    private: Zeroizing<Vec<u8>>,
    public: BigUint,
    session: Option<Session>,
}

impl SrpClient {
    /// Start an exchange with a fresh 256-bit private exponent.
    pub fn new() -> Self {
        let mut private = Zeroizing::new(vec![0u8; PRIVATE_EXPONENT_BYTES]);
        OsRng.fill_bytes(&mut private);
        Self::from_private_exponent(&private)
    }

    /// Start an exchange with a caller-chosen private exponent.
    pub fn from_private_exponent(private: &[u8]) -> Self {
        let a = BigUint::from_bytes_be(private);
        let public = G.modpow(&a, &N);
        Self {
            private: Zeroizing::new(private.to_vec()),
            public,
            session: None,
        }
    }

    /// `A`, minimal big-endian encoding.
    pub fn public_value(&self) -> Vec<u8> {
        self.public.to_bytes_be()
    }

    /// Derive the session key from the server challenge and return `M1`.
    pub fn process_challenge(
        &mut self,
        username: &str,
        password: &str,
        salt: &[u8],
        iterations: u32,
        protocol: PasswordProtocol,
        server_public: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let b_pub = BigUint::from_bytes_be(server_public);
        if (&b_pub % &*N).bits() == 0 {
            return Err(ProtocolError::InvalidServerValue);
        }
        if iterations == 0 {
            return Err(ProtocolError::ChallengeFailed);
        }

        let a_bytes = self.public_value();
        let u = hash_padded_pair(&a_bytes, server_public);
        if u.bits() == 0 {
            return Err(ProtocolError::ChallengeFailed);
        }
        let k = hash_padded_pair(&N.to_bytes_be(), &G.to_bytes_be());

        let password_key = derive_password_key(password, salt, iterations, protocol);
        let x = {
            let inner = Sha256::new()
                .chain_update(b":")
                .chain_update(&*password_key)
                .finalize();
            let outer = Sha256::new().chain_update(salt).chain_update(inner).finalize();
            BigUint::from_bytes_be(&outer)
        };

        let a = BigUint::from_bytes_be(&self.private);
        let n = &*N;
        let gx_k = (G.modpow(&x, n) * &k) % n;
        let base = ((&b_pub % n) + n - gx_k) % n;
        let shared = base.modpow(&(a + &u * &x), n);

        let key = Zeroizing::new(Sha256::digest(shared.to_bytes_be()).to_vec());

        let g_hash = Sha256::digest(pad(&G.to_bytes_be()));
        let n_hash = Sha256::digest(n.to_bytes_be());
        let group_hash: Vec<u8> = g_hash.iter().zip(n_hash.iter()).map(|(l, r)| l ^ r).collect();

        let m1 = Sha256::new()
            .chain_update(&group_hash)
            .chain_update(Sha256::digest(username.as_bytes()))
            .chain_update(salt)
            .chain_update(&a_bytes)
            .chain_update(server_public)
            .chain_update(&*key)
            .finalize()
            .to_vec();

        let expected_m2 = Sha256::new()
            .chain_update(&a_bytes)
            .chain_update(&m1)
            .chain_update(&*key)
            .finalize()
            .to_vec();

        self.session = Some(Session { key, expected_m2 });
        Ok(m1)
    }

    /// Compare the server's `M2` against the expected `HAMK`.
    pub fn verify_server_evidence(&self, m2: &[u8]) -> bool {
        match &self.session {
            Some(session) => bool::from(session.expected_m2.as_slice().ct_eq(m2)),
            None => false,
        }
    }

    /// Check the negotiated-protocol proof `np` against the transcript digest.
    pub fn verify_transcript(&self, transcript_digest: &[u8], proof: &[u8]) -> bool {
        let Ok(key) = self.sub_key(HMAC_KEY_LABEL) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&key) else {
            return false;
        };
        mac.update(transcript_digest);
        mac.verify_slice(proof).is_ok()
    }

    /// Decrypt the `spd` blob returned by the `complete` step.
    pub fn decrypt_session_payload(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let key = self.sub_key(EXTRA_DATA_KEY_LABEL)?;
        let iv = self.sub_key(EXTRA_DATA_IV_LABEL)?;
        let cipher = Aes256CbcDec::new_from_slices(&key, &iv[..16])
            .map_err(|_| ProtocolError::ChallengeFailed)?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| ProtocolError::InvalidSession)
    }

    /// Session key `K`, once the challenge has been processed.
    pub fn session_key(&self) -> Option<&[u8]> {
        self.session.as_ref().map(|s| s.key.as_slice())
    }

    fn sub_key(&self, label: &str) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
        let session = self.session.as_ref().ok_or(ProtocolError::NotReady)?;
        Ok(Zeroizing::new(hmac_sha256(&session.key, label.as_bytes())?))
    }
}

impl Default for SrpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SrpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrpClient")
            .field("ready", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

/// PBKDF2-SHA256 over the (possibly hex-encoded) password digest.
fn derive_password_key(
    password: &str,
    salt: &[u8],
    iterations: u32,
    protocol: PasswordProtocol,
) -> Zeroizing<[u8; 32]> {
    let digest = Zeroizing::new(Sha256::digest(password.as_bytes()).to_vec());
    let input = if protocol.is_legacy() {
        Zeroizing::new(hex::encode(&*digest).into_bytes())
    } else {
        digest
    };
    let mut out = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(&input, salt, iterations, &mut *out);
    out
}

fn hash_padded_pair(x: &[u8], y: &[u8]) -> BigUint {
    let digest = Sha256::new()
        .chain_update(pad(x))
        .chain_update(pad(y))
        .finalize();
    BigUint::from_bytes_be(&digest)
}

pub(crate) fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| ProtocolError::ChallengeFailed)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}
