use crate::api::handlers::share::gate::{generate_salt, hash_password};
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct Args {
    pub password: SecretString,
    pub salt: Option<String>,
}

/// Print the `password_salt` / `password_hash` pair for a share.
/// # Errors
/// Returns an error if a salt has to be generated and the OS RNG fails.
pub fn execute(args: &Args) -> Result<()> {
    let (salt, hash) = material(args)?;
    println!("password_salt={salt}");
    println!("password_hash={hash}");
    Ok(())
}

fn material(args: &Args) -> Result<(String, String)> {
    let salt = match &args.salt {
        Some(salt) => salt.clone(),
        None => generate_salt()?,
    };
    let hash = hash_password(&salt, args.password.expose_secret());
    Ok((salt, hash))
}
