use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

const PLACEHOLDER_SECRET: &str = "CHANGE_ME_JWT_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// PostgreSQL connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Lifetime of issued tokens in seconds. Set via PARTAGE_TOKEN_TTL_SECS. Default: 7200.
    pub token_ttl_secs: i64,
    /// Requests admitted per client per window. 0 = disabled.
    /// Set via PARTAGE_RATE_LIMIT env var. Default: 100.
    pub rate_limit: u64,
    /// Window in seconds for the rate limit.
    /// Set via PARTAGE_RATE_LIMIT_WINDOW env var. Default: 60.
    pub rate_limit_window: u64,
    /// How often idle rate buckets are swept, in seconds.
    pub rate_limit_sweep_secs: u64,
    /// Key rate buckets on the first X-Forwarded-For hop instead of the peer address.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Projects created at startup when running on the in-memory store, with
    /// ids 1..=n. Set via PARTAGE_SEED_PROJECTS. Default: 1.
    pub seed_projects: u64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    pub dashboard_origin: String,
}

impl Config {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs)
    }
}

/// Parse a numeric setting; unset or unparseable values fall back to the default.
fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary key lookup (the process environment in
/// production, a map in tests).
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let jwt_secret = lookup("JWT_SECRET")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_SECRET.into());

    if jwt_secret == PLACEHOLDER_SECRET {
        let env_mode = lookup("PARTAGE_ENV")
            .or_else(|| lookup("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "JWT_SECRET is not set. \
                 Set a long random signing secret before running in production."
            );
        }
        tracing::warn!("JWT_SECRET is not set, using insecure placeholder signing secret");
    }

    Ok(Config {
        port: parsed(lookup("PARTAGE_PORT")).unwrap_or(8080),
        database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
        jwt_secret,
        token_ttl_secs: parsed(lookup("PARTAGE_TOKEN_TTL_SECS")).unwrap_or(2 * 60 * 60),
        rate_limit: parsed(lookup("PARTAGE_RATE_LIMIT")).unwrap_or(100),
        rate_limit_window: parsed(lookup("PARTAGE_RATE_LIMIT_WINDOW"))
            .filter(|w| *w > 0)
            .unwrap_or(60),
        rate_limit_sweep_secs: parsed(lookup("PARTAGE_RATE_LIMIT_SWEEP_SECS"))
            .filter(|s| *s > 0)
            .unwrap_or(60),
        trust_forwarded_for: lookup("PARTAGE_TRUST_FORWARDED_FOR")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false),
        seed_projects: parsed(lookup("PARTAGE_SEED_PROJECTS")).unwrap_or(1),
        argon2_memory_kib: parsed(lookup("PARTAGE_ARGON2_MEMORY_KIB"))
            .unwrap_or(argon2::Params::DEFAULT_M_COST),
        argon2_iterations: parsed(lookup("PARTAGE_ARGON2_ITERATIONS"))
            .unwrap_or(argon2::Params::DEFAULT_T_COST),
        argon2_parallelism: parsed(lookup("PARTAGE_ARGON2_PARALLELISM"))
            .unwrap_or(argon2::Params::DEFAULT_P_COST),
        dashboard_origin: lookup("DASHBOARD_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = load_from(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.token_ttl_secs, 7200);
        assert_eq!(cfg.rate_limit, 100);
        assert_eq!(cfg.rate_limit_window(), Duration::from_secs(60));
        assert!(!cfg.trust_forwarded_for);
        assert_eq!(cfg.seed_projects, 1);
        assert_eq!(cfg.argon2_memory_kib, argon2::Params::DEFAULT_M_COST);
    }

    #[test]
    fn test_overrides() {
        let cfg = load_from(&[
            ("JWT_SECRET", "s3cret"),
            ("PARTAGE_PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/partage"),
            ("PARTAGE_RATE_LIMIT", "5"),
            ("PARTAGE_RATE_LIMIT_WINDOW", "10"),
            ("PARTAGE_TRUST_FORWARDED_FOR", "TRUE"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/partage"));
        assert_eq!(cfg.rate_limit, 5);
        assert_eq!(cfg.rate_limit_window, 10);
        assert!(cfg.trust_forwarded_for);
    }

    /// Every numeric setting goes through the same parser whatever its width.
    #[test]
    fn test_numeric_fields_of_every_width() {
        let cfg = load_from(&[
            ("JWT_SECRET", "s3cret"),
            ("PARTAGE_PORT", "8443"),
            ("PARTAGE_TOKEN_TTL_SECS", " 900 "),
            ("PARTAGE_RATE_LIMIT_SWEEP_SECS", "15"),
            ("PARTAGE_SEED_PROJECTS", "0"),
            ("PARTAGE_ARGON2_MEMORY_KIB", "4096"),
            ("PARTAGE_ARGON2_ITERATIONS", "3"),
            ("PARTAGE_ARGON2_PARALLELISM", "2"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8443u16);
        assert_eq!(cfg.token_ttl_secs, 900i64);
        assert_eq!(cfg.token_ttl(), chrono::Duration::minutes(15));
        assert_eq!(cfg.rate_limit_sweep_secs, 15u64);
        assert_eq!(cfg.seed_projects, 0);
        assert_eq!(cfg.argon2_memory_kib, 4096u32);
        assert_eq!(cfg.argon2_iterations, 3);
        assert_eq!(cfg.argon2_parallelism, 2);
    }

    #[test]
    fn test_garbage_values_fall_back() {
        let cfg = load_from(&[
            ("JWT_SECRET", "s3cret"),
            ("PARTAGE_PORT", "not-a-port"),
            ("PARTAGE_RATE_LIMIT_WINDOW", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.rate_limit_window, 60); // zero-length window is meaningless
    }

    #[test]
    fn test_placeholder_secret_rejected_in_production() {
        let err = load_from(&[("PARTAGE_ENV", "production")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let cfg = load_from(&[]).unwrap();
        assert_eq!(cfg.jwt_secret, PLACEHOLDER_SECRET);
    }
}
