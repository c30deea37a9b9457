//! Persistence collaborators used by the access-control layer.
//!
//! The service only needs three things from storage: look up a user by email,
//! create a user, and flip one row of the project/user likes relation.
//! `toggle_like` must be atomic in the implementation: callers never do a
//! separate read followed by a write.

use async_trait::async_trait;

use crate::models::like::{ProjectId, ToggleOutcome};
use crate::models::user::{UserId, UserRecord};

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;

    /// Insert a user. Returns `None` when the email is already registered;
    /// the uniqueness check and the insert are a single atomic step.
    async fn create_user(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<UserId>>;

    /// Flip `user`'s membership in `project`'s likes set and report the new state.
    async fn toggle_like(&self, project: ProjectId, user: UserId) -> anyhow::Result<ToggleOutcome>;

    /// Users who like `project`, or `None` if the project does not exist.
    async fn project_likes(&self, project: ProjectId) -> anyhow::Result<Option<Vec<UserId>>>;

    /// Readiness probe.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
