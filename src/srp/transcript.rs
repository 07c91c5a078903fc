// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Running hash over the negotiated-protocol transcript.
//!
//! The login handshake feeds the protocol list, separators, the selected
//! protocol and the encrypted completion payload into this accumulator in
//! send order. The final digest is authenticated by the server's `np` proof.

use sha2::{Digest, Sha256};

/// SHA-256 accumulator for the handshake transcript.
#[derive(Clone, Default)]
pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw UTF-8 bytes with no framing.
    pub fn add_str(&mut self, value: &str) {
        self.hasher.update(value.as_bytes());
    }

    /// Append a length-prefixed blob (u32 little-endian length, then bytes).
    pub fn add_data(&mut self, value: &[u8]) {
        let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
        self.hasher.update(len.to_le_bytes());
        self.hasher.update(value);
    }

    /// Digest of everything added so far. The accumulator stays usable.
    pub fn digest(&self) -> [u8; 32] {
        self.hasher.clone().finalize().into()
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript").finish_non_exhaustive()
    }
}
