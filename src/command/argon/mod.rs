mod error;

use argh::FromArgs;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};

pub use error::Error;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "argon",
    description = "Hash a password for a [basic.<scheme>.identity] entry"
)]
pub struct Options {}

pub struct Command {}

impl Command {
    pub fn run() -> Result<(), Error> {
        let password = rpassword::prompt_password("Input Password: ")?;
        if password.is_empty() {
            return Err(Error::Input("Password must not be empty".to_string()));
        }

        let hash = hash_identity_password(&password)?;
        println!("{hash}");
        Ok(())
    }
}

/// Produces the PHC string stored as the `password` of a basic scheme identity.
pub fn hash_identity_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(OsRng);
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    let hash = argon.hash_password(password.as_bytes(), &salt)?;

    Ok(hash.to_string())
}
