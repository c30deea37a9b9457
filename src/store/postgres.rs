use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::like::{LikeState, ProjectId, ToggleOutcome};
use crate::models::user::{UserId, UserRecord};
use crate::store::Store;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<UserId>> {
        let id = sqlx::query_scalar::<_, UserId>(
            r#"INSERT INTO users (email, password_hash) VALUES ($1, $2)
               ON CONFLICT (email) DO NOTHING
               RETURNING id"#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// One transaction: lock the project row, then delete the pair or insert it.
    /// The row lock serialises concurrent toggles on the same project, and the
    /// transaction rolls back if the request is dropped before commit.
    async fn toggle_like(&self, project: ProjectId, user: UserId) -> anyhow::Result<ToggleOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
            .bind(project)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(ToggleOutcome::ProjectNotFound);
        }

        let user_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(user)
                .fetch_one(&mut *tx)
                .await?;
        if !user_exists {
            return Ok(ToggleOutcome::UserNotFound);
        }

        let removed = sqlx::query("DELETE FROM project_likes WHERE project_id = $1 AND user_id = $2")
            .bind(project)
            .bind(user)
            .execute(&mut *tx)
            .await?;

        let state = if removed.rows_affected() > 0 {
            LikeState::Unliked
        } else {
            sqlx::query("INSERT INTO project_likes (project_id, user_id) VALUES ($1, $2)")
                .bind(project)
                .bind(user)
                .execute(&mut *tx)
                .await?;
            LikeState::Liked
        };

        tx.commit().await?;
        Ok(ToggleOutcome::Toggled(state))
    }

    async fn project_likes(&self, project: ProjectId) -> anyhow::Result<Option<Vec<UserId>>> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
                .bind(project)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Ok(None);
        }

        let users = sqlx::query_scalar::<_, UserId>(
            "SELECT user_id FROM project_likes WHERE project_id = $1 ORDER BY user_id",
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(users))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
