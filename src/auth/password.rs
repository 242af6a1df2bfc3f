//! Password Hashing
//! Mission: One-way salted bcrypt hashing with a deliberately slow cost

use anyhow::{Context, Result};
use tracing::debug;

/// Work factor used in production (on the order of 250ms per hash)
pub const DEFAULT_COST: u32 = 12;

/// Lowest work factor bcrypt accepts
pub const MIN_COST: u32 = 4;

/// Highest work factor bcrypt accepts
pub const MAX_COST: u32 = 31;

/// bcrypt password hasher with a fixed cost
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Create a hasher, clamping the cost into bcrypt's accepted range
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        bcrypt::hash(plaintext, self.cost).context("Failed to hash password")
    }

    /// Verify a plaintext password against a stored hash.
    ///
    /// A malformed stored hash is treated as a mismatch.
    pub fn verify(&self, plaintext: &str, stored: &str) -> bool {
        match bcrypt::verify(plaintext, stored) {
            Ok(valid) => valid,
            Err(e) => {
                debug!("Stored password hash rejected: {}", e);
                false
            }
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}
