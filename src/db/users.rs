//! User account operations: registration, authentication, status moderation
//! and paged listing.

use super::Store;
use crate::error::{AppError, Result};
use crate::models::{User, UserStatus};
use tracing::{debug, info};

/// Page cursor for user listings.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    fn offset(&self) -> i64 {
        self.page as i64 * self.per_page as i64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 0, per_page: 50 }
    }
}

type UserRow = (String, String, String, i16);

fn user_from_row((username, name, surname, status): UserRow) -> User {
    User {
        username,
        name,
        surname,
        // Unknown codes cannot appear through this API; treat them as the
        // most restrictive status rather than failing the whole listing.
        status: UserStatus::from_i16(status).unwrap_or(UserStatus::NotEnabled),
    }
}

impl Store {
    /// Registers a new account. A taken username is a `Conflict`.
    pub async fn register_user(&self, user: &User, password: &str) -> Result<()> {
        let inserted = sqlx::query(
            r#"INSERT INTO users (username, password, name, surname, status)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (username) DO NOTHING"#,
        )
        .bind(&user.username)
        .bind(password)
        .bind(&user.name)
        .bind(&user.surname)
        .bind(user.status.as_i16())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(AppError::Conflict(format!(
                "username {} is already taken",
                user.username
            )));
        }
        info!("Registered user {}", user.username);
        Ok(())
    }

    /// Checks credentials; `None` means unknown username or wrong password.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT username, name, surname, status FROM users
               WHERE username = $1 AND password = $2"#,
        )
        .bind(username)
        .bind(password)
        .fetch_optional(&self.pool)
        .await?;

        debug!(
            "Authentication for {}: {}",
            username,
            if row.is_some() { "ok" } else { "rejected" }
        );
        Ok(row.map(user_from_row))
    }

    /// Users in any of the given statuses, one page at a time, ordered by
    /// username.
    pub async fn get_users_by_status(
        &self,
        statuses: &[UserStatus],
        page: Page,
    ) -> Result<Vec<User>> {
        let codes: Vec<i16> = statuses.iter().map(|s| s.as_i16()).collect();
        let rows = sqlx::query_as::<_, UserRow>(
            r#"SELECT username, name, surname, status FROM users
               WHERE status = ANY($1)
               ORDER BY username
               LIMIT $2 OFFSET $3"#,
        )
        .bind(&codes)
        .bind(page.per_page as i64)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    /// Moderation action: changes a user's status. Unknown username is a
    /// validation error.
    pub async fn update_user_status(&self, username: &str, status: UserStatus) -> Result<()> {
        let updated = sqlx::query(r#"UPDATE users SET status = $1 WHERE username = $2"#)
            .bind(status.as_i16())
            .bind(username)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AppError::Validation(format!("unknown user {}", username)));
        }
        info!("User {} is now {}", username, status);
        Ok(())
    }
}

// --- Integration Tests ---
// Gated by the `integration-tests` feature; require a PostgreSQL instance.
#[cfg(test)]
#[cfg(feature = "integration-tests")]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn alice() -> User {
        User::new("alice", "Alice", "Verdi", UserStatus::NotEnabled)
    }

    #[sqlx::test]
    async fn duplicate_username_is_a_conflict(pool: PgPool) -> Result<()> {
        let store = Store::from_pool(pool);
        store.init_schema().await?;

        store.register_user(&alice(), "secret").await?;
        let err = store.register_user(&alice(), "other").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        Ok(())
    }

    #[sqlx::test]
    async fn authenticate_checks_credentials(pool: PgPool) -> Result<()> {
        let store = Store::from_pool(pool);
        store.init_schema().await?;
        store.register_user(&alice(), "secret").await?;

        let user = store.authenticate("alice", "secret").await?;
        assert_eq!(user, Some(alice()));
        assert_eq!(store.authenticate("alice", "wrong").await?, None);
        assert_eq!(store.authenticate("nobody", "secret").await?, None);
        Ok(())
    }

    #[sqlx::test]
    async fn status_update_and_paged_listing(pool: PgPool) -> Result<()> {
        let store = Store::from_pool(pool);
        store.init_schema().await?;

        for name in ["alice", "bob", "carol"] {
            store
                .register_user(&User::new(name, "T", "U", UserStatus::NotEnabled), "pw")
                .await?;
        }
        store.update_user_status("bob", UserStatus::Enabled).await?;

        let pending = store
            .get_users_by_status(&[UserStatus::NotEnabled], Page::default())
            .await?;
        assert_eq!(pending.len(), 2);

        let first_page = store
            .get_users_by_status(&[UserStatus::NotEnabled], Page::new(0, 1))
            .await?;
        assert_eq!(first_page.len(), 1);
        assert_eq!(first_page[0].username, "alice");
        let second_page = store
            .get_users_by_status(&[UserStatus::NotEnabled], Page::new(1, 1))
            .await?;
        assert_eq!(second_page[0].username, "carol");

        let err = store
            .update_user_status("nobody", UserStatus::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        Ok(())
    }
}
