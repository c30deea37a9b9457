//! Password hashing and strength policy.
//!
//! Hashes are Argon2id PHC strings with a fresh random salt per call, so the
//! same password never hashes to the same string twice but always verifies.
//! Cost parameters come from configuration.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use thiserror::Error;

/// Minimum number of characters a new password must have.
pub const MIN_SECRET_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("password hashing failed: {0}")]
    HashFailed(String),

    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a password was refused at registration. The message is shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeakSecret {
    #[error("Password must be at least 8 characters long.")]
    TooShort,

    #[error("Password must contain at least one lowercase letter.")]
    MissingLowercase,

    #[error("Password must contain at least one uppercase letter.")]
    MissingUppercase,

    #[error("Password must contain at least one digit.")]
    MissingDigit,

    #[error("Password must contain at least one special character.")]
    MissingSpecial,
}

#[derive(Clone)]
pub struct CredentialService {
    params: Params,
    /// Hash of a random password nobody knows, made with the configured cost.
    /// Logins for unknown emails verify against it so they take as long as
    /// a wrong password for a real account.
    decoy_hash: Arc<str>,
    verifications: Arc<AtomicU64>,
}

impl CredentialService {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, CredentialError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;
        let mut svc = Self {
            params,
            decoy_hash: Arc::from(""),
            verifications: Arc::new(AtomicU64::new(0)),
        };
        let decoy = Alphanumeric.sample_string(&mut OsRng, 32);
        svc.decoy_hash = Arc::from(svc.hash_secret(&decoy)?);
        Ok(svc)
    }

    /// Number of password verifications performed, real or decoy.
    pub fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_secret(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::HashFailed(e.to_string()))
    }

    /// Parameters embedded in the PHC string win over the configured ones, so
    /// hashes made before a cost change keep verifying.
    pub fn verify_secret(&self, plaintext: &str, hash: &str) -> bool {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        let parsed = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        self.hasher()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// `hash_secret` on the blocking pool.
    pub async fn hash(&self, plaintext: String) -> Result<String, CredentialError> {
        let svc = self.clone();
        tokio::task::spawn_blocking(move || svc.hash_secret(&plaintext)).await?
    }

    /// `verify_secret` on the blocking pool.
    pub async fn verify(&self, plaintext: String, hash: String) -> Result<bool, CredentialError> {
        let svc = self.clone();
        Ok(tokio::task::spawn_blocking(move || svc.verify_secret(&plaintext, &hash)).await?)
    }

    /// Burn one verification against the decoy hash. Always `false`.
    pub async fn verify_decoy(&self, plaintext: String) -> Result<bool, CredentialError> {
        let svc = self.clone();
        tokio::task::spawn_blocking(move || {
            svc.verify_secret(&plaintext, &svc.decoy_hash);
            false
        })
        .await
        .map_err(CredentialError::from)
    }
}

pub fn validate_secret_strength(plaintext: &str) -> Result<(), WeakSecret> {
    if plaintext.chars().count() < MIN_SECRET_LEN {
        return Err(WeakSecret::TooShort);
    }
    if !plaintext.chars().any(|c| c.is_lowercase()) {
        return Err(WeakSecret::MissingLowercase);
    }
    if !plaintext.chars().any(|c| c.is_uppercase()) {
        return Err(WeakSecret::MissingUppercase);
    }
    if !plaintext.chars().any(|c| c.is_ascii_digit()) {
        return Err(WeakSecret::MissingDigit);
    }
    if !plaintext.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        return Err(WeakSecret::MissingSpecial);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialService {
        CredentialService::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let svc = cheap();
        let hash = svc.hash_secret("Aa1!aaaa").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(svc.verify_secret("Aa1!aaaa", &hash));
        assert!(!svc.verify_secret("Aa1!aaab", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let svc = cheap();
        let a = svc.hash_secret("Password123!").unwrap();
        let b = svc.hash_secret("Password123!").unwrap();
        assert_ne!(a, b);
        assert!(svc.verify_secret("Password123!", &a));
        assert!(svc.verify_secret("Password123!", &b));
    }

    #[test]
    fn test_verify_garbage_hash_is_false() {
        assert!(!cheap().verify_secret("anything", "not-a-phc-string"));
        assert!(!cheap().verify_secret("anything", ""));
    }

    #[test]
    fn test_hash_made_with_other_cost_still_verifies() {
        let old = CredentialService::new(2048, 2, 1).unwrap();
        let hash = old.hash_secret("Password123!").unwrap();
        assert!(cheap().verify_secret("Password123!", &hash));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(
            CredentialService::new(1024, 0, 1),
            Err(CredentialError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let svc = cheap();
        let hash = svc.hash("Aa1!aaaa".into()).await.unwrap();
        assert!(svc.verify("Aa1!aaaa".into(), hash.clone()).await.unwrap());
        assert!(!svc.verify("wrong".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_decoy_verification_is_counted_and_never_matches() {
        let svc = cheap();
        assert_eq!(svc.verifications(), 0);
        assert!(!svc.verify_decoy("Aa1!aaaa".into()).await.unwrap());
        assert!(!svc.verify_decoy(String::new()).await.unwrap());
        assert_eq!(svc.verifications(), 2);

        // Clones share the counter, as the blocking-pool copies do.
        let hash = svc.hash_secret("Aa1!aaaa").unwrap();
        svc.clone().verify_secret("Aa1!aaaa", &hash);
        assert_eq!(svc.verifications(), 3);
    }

    #[test]
    fn test_strength_policy() {
        assert_eq!(validate_secret_strength("Aa1!aaaa"), Ok(()));
        assert_eq!(validate_secret_strength("Password123!"), Ok(()));
        assert_eq!(validate_secret_strength("Aa1!aaa"), Err(WeakSecret::TooShort));
        assert_eq!(validate_secret_strength("AA1!AAAA"), Err(WeakSecret::MissingLowercase));
        assert_eq!(validate_secret_strength("aa1!aaaa"), Err(WeakSecret::MissingUppercase));
        assert_eq!(validate_secret_strength("Aaa!aaaa"), Err(WeakSecret::MissingDigit));
        assert_eq!(validate_secret_strength("Aa1aaaaa"), Err(WeakSecret::MissingSpecial));
    }

    #[test]
    fn test_weak_secret_messages() {
        assert_eq!(
            WeakSecret::TooShort.to_string(),
            "Password must be at least 8 characters long."
        );
    }
}
