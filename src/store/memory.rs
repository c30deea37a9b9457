//! In-process store used when no `DATABASE_URL` is configured, and by tests.
//!
//! Atomicity comes from DashMap entry locks: each project's likes set is
//! flipped while its shard is held, and email uniqueness is decided on the
//! email entry.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::like::{LikeState, ProjectId, ToggleOutcome};
use crate::models::user::{UserId, UserRecord};
use crate::store::Store;

pub struct MemoryStore {
    next_user_id: AtomicI64,
    next_project_id: AtomicI64,
    users: DashMap<UserId, UserRecord>,
    emails: DashMap<String, UserId>,
    /// A project exists iff it has an entry here, even with no likes.
    likes: DashMap<ProjectId, HashSet<UserId>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_user_id: AtomicI64::new(1),
            next_project_id: AtomicI64::new(1),
            users: DashMap::new(),
            emails: DashMap::new(),
            likes: DashMap::new(),
        }
    }

    /// Register a project so it can be liked. Projects are otherwise owned
    /// by the project service.
    pub fn create_project(&self) -> ProjectId {
        let id = self.next_project_id.fetch_add(1, Ordering::SeqCst);
        self.likes.insert(id, HashSet::new());
        id
    }

    /// A store holding `n` projects with ids `1..=n` and no likes.
    pub fn with_projects(n: u64) -> Self {
        let store = Self::new();
        for _ in 0..n {
            store.create_project();
        }
        store
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let id = match self.emails.get(email) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<UserId>> {
        match self.emails.entry(email.to_string()) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let id = UserId(self.next_user_id.fetch_add(1, Ordering::SeqCst));
                self.users.insert(
                    id,
                    UserRecord {
                        id,
                        email: email.to_string(),
                        password_hash: password_hash.to_string(),
                        created_at: Utc::now(),
                    },
                );
                slot.insert(id);
                Ok(Some(id))
            }
        }
    }

    async fn toggle_like(&self, project: ProjectId, user: UserId) -> anyhow::Result<ToggleOutcome> {
        let mut likers = match self.likes.get_mut(&project) {
            Some(set) => set,
            None => return Ok(ToggleOutcome::ProjectNotFound),
        };
        if !self.users.contains_key(&user) {
            return Ok(ToggleOutcome::UserNotFound);
        }

        let state = if likers.remove(&user) {
            LikeState::Unliked
        } else {
            likers.insert(user);
            LikeState::Liked
        };
        Ok(ToggleOutcome::Toggled(state))
    }

    async fn project_likes(&self, project: ProjectId) -> anyhow::Result<Option<Vec<UserId>>> {
        Ok(self.likes.get(&project).map(|set| {
            let mut users: Vec<UserId> = set.iter().copied().collect();
            users.sort();
            users
        }))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let store = MemoryStore::new();
        let first = store.create_user("a@x.com", "h1").await.unwrap();
        assert_eq!(first, Some(UserId(1)));
        assert_eq!(store.create_user("a@x.com", "h2").await.unwrap(), None);
        assert_eq!(store.user_count(), 1);

        let rec = store.find_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(rec.password_hash, "h1");
    }

    #[tokio::test]
    async fn test_seeded_projects_are_likeable() {
        let store = MemoryStore::with_projects(3);
        let user = store.create_user("a@x.com", "h").await.unwrap().unwrap();

        assert_eq!(
            store.toggle_like(1, user).await.unwrap(),
            ToggleOutcome::Toggled(LikeState::Liked)
        );
        assert_eq!(store.project_likes(3).await.unwrap(), Some(vec![]));
        assert_eq!(store.project_likes(4).await.unwrap(), None);
        assert_eq!(store.create_project(), 4);
    }

    #[tokio::test]
    async fn test_find_unknown_email() {
        let store = MemoryStore::new();
        assert!(store.find_user_by_email("nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let store = MemoryStore::new();
        let project = store.create_project();
        let user = store.create_user("a@x.com", "h").await.unwrap().unwrap();

        assert_eq!(
            store.toggle_like(project, user).await.unwrap(),
            ToggleOutcome::Toggled(LikeState::Liked)
        );
        assert_eq!(store.project_likes(project).await.unwrap(), Some(vec![user]));

        assert_eq!(
            store.toggle_like(project, user).await.unwrap(),
            ToggleOutcome::Toggled(LikeState::Unliked)
        );
        assert_eq!(store.project_likes(project).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_toggle_missing_rows_does_not_mutate() {
        let store = MemoryStore::new();
        let project = store.create_project();
        let user = store.create_user("a@x.com", "h").await.unwrap().unwrap();

        assert_eq!(
            store.toggle_like(999, user).await.unwrap(),
            ToggleOutcome::ProjectNotFound
        );
        assert_eq!(
            store.toggle_like(project, UserId(999)).await.unwrap(),
            ToggleOutcome::UserNotFound
        );
        assert_eq!(store.project_likes(project).await.unwrap(), Some(vec![]));
        assert_eq!(store.project_likes(999).await.unwrap(), None);
    }
}
