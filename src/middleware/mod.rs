pub mod auth;
pub mod headers;
pub mod metrics;
pub mod rate_limit;
