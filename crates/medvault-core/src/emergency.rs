//! Emergency access codes.
//!
//! An owner can mint a code that lets anyone holding it read a snapshot of
//! all of the owner's documents, without a consent grant. At most one
//! non-revoked code exists per owner; minting a new one revokes the old.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::PrincipalId;

/// Symbols used in codes. No `0/O`, `1/I/L` to survive being read aloud.
pub const EMERGENCY_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// An owner-issued bypass code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyCode {
    pub code: String,
    pub owner_id: PrincipalId,
    pub created_at: i64,
    pub revoked: bool,
    pub revoked_at: Option<i64>,
}

impl EmergencyCode {
    /// Mint a fresh random code of `len` symbols.
    pub fn generate(owner_id: PrincipalId, len: usize, now: i64) -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..len.max(1))
            .map(|_| {
                let idx = rng.gen_range(0..EMERGENCY_CODE_ALPHABET.len());
                EMERGENCY_CODE_ALPHABET[idx] as char
            })
            .collect();

        Self {
            code,
            owner_id,
            created_at: now,
            revoked: false,
            revoked_at: None,
        }
    }

    /// Revoke the code. Returns `false` if it was already revoked.
    pub fn revoke(&mut self, now: i64) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.revoked_at = Some(now);
        true
    }

    pub fn is_valid(&self) -> bool {
        !self.revoked
    }

    /// Canonical form of user input: uppercase, separators removed.
    pub fn normalize(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    /// Code grouped in fours for display, e.g. `ABCD-EFGH-JKMN`.
    pub fn display(&self) -> String {
        self.code
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join("-")
    }
}
