//! Canonical SHA-256 digest of engine state.
//!
//! Every ledger feeds its fields in a fixed order, with strings length-prefixed,
//! so two states hash equal iff their contents are equal.

use sha2::{Digest, Sha256};

pub struct StateDigest {
    hasher: Sha256,
}

impl StateDigest {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn str(&mut self, data: &str) -> &mut Self {
        self.hasher.update((data.len() as u32).to_le_bytes());
        self.hasher.update(data.as_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn u128(&mut self, value: u128) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn i128(&mut self, value: i128) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    /// Section marker, so adjacent collections cannot alias.
    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.str(tag)
    }

    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl Default for StateDigest {
    fn default() -> Self {
        Self::new()
    }
}
