//! Password hashing and verification for login credentials.
//!
//! Argon2id with PHC-formatted output: the stored string embeds algorithm,
//! parameters, and salt, so verification is self-describing and cost
//! upgrades don't invalidate existing hashes.

use anyhow::{Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use tracing::warn;

const DEFAULT_MEMORY_KIB: u32 = 19456;
const DEFAULT_ITERATIONS: u32 = 2;
const DEFAULT_PARALLELISM: u32 = 1;

/// Argon2id cost parameters. Defaults are 19 MiB, 2 passes, 1 lane.
#[derive(Clone, Copy, Debug)]
pub struct Argon2Costs {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Costs {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_MEMORY_KIB,
            iterations: DEFAULT_ITERATIONS,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

/// One-way hash/verify seam so handlers and tests don't hard-wire Argon2.
pub trait PasswordHasher: Send + Sync {
    /// Hash a password into a PHC string for storage.
    fn hash(&self, password: &str) -> Result<String>;

    /// Verify a password against a stored PHC hash.
    ///
    /// A hash that cannot be parsed verifies `false` rather than erroring,
    /// so a corrupt row reads as "wrong password", never "no password set".
    fn verify(&self, encoded_hash: &str, password: &str) -> bool;

    /// Verify a login attempt, where `None` means the username matched no
    /// user. Unknown users still cost a full verification so response timing
    /// does not reveal whether the account exists.
    fn verify_login(&self, encoded_hash: Option<&str>, password: &str) -> bool;
}

pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
    /// Burned for unknown usernames to equalize login timing.
    unknown_user_hash: String,
}

impl Argon2PasswordHasher {
    /// Build a hasher with the given costs.
    ///
    /// # Errors
    /// Returns an error when the costs are outside Argon2's accepted ranges.
    pub fn new(costs: Argon2Costs) -> Result<Self> {
        let params = Params::new(costs.memory_kib, costs.iterations, costs.parallelism, None)
            .map_err(|err| anyhow!("invalid argon2 parameters: {err}"))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let unknown_user_hash = hash_with(&argon2, "larder-unknown-user")?;
        Ok(Self {
            argon2,
            unknown_user_hash,
        })
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String> {
        hash_with(&self.argon2, password)
    }

    fn verify(&self, encoded_hash: &str, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(encoded_hash) else {
            warn!("Malformed password hash in user record");
            return false;
        };
        // Cost parameters come from the hash itself, not this instance.
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    fn verify_login(&self, encoded_hash: Option<&str>, password: &str) -> bool {
        match encoded_hash {
            Some(hash) => self.verify(hash, password),
            None => {
                let _ = self.verify(&self.unknown_user_hash, password);
                false
            }
        }
    }
}

#[cfg(test)]
pub(super) fn test_costs() -> Argon2Costs {
    // Minimum legal costs keep the test suite fast.
    Argon2Costs {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}
