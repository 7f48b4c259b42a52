use crate::api::handlers::auth::{Argon2Costs, Argon2PasswordHasher, PasswordHasher};
use anyhow::{Context, Result, bail};
use std::io::BufRead;

/// Hash a password read from stdin, for provisioning rows in `users`.
///
/// Reads a single line so it works both interactively and piped:
/// `echo -n 's3cret' | larder hash-password`.
///
/// # Errors
/// Returns an error if stdin cannot be read, the password is empty, or
/// hashing fails.
pub fn execute() -> Result<()> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    // Strip the line terminator, nothing else; passwords may contain spaces.
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let hasher = Argon2PasswordHasher::new(Argon2Costs::default())?;
    let hash = hasher.hash(password)?;

    println!("{hash}");

    Ok(())
}
