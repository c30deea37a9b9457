//! Credential hashing and identity tokens.

pub mod credentials;
pub mod token;

pub use credentials::{validate_secret_strength, CredentialService, WeakSecret};
pub use token::{TokenError, TokenService};
