use anyhow::Context;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::repo_types::Admin;

impl Admin {
    pub async fn find_by_username(db: &SqlitePool, username: &str) -> anyhow::Result<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            SELECT id, username, password_hash
            FROM admins
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find admin by username")?;
        Ok(admin)
    }

    /// Inserts the account unless the username is taken. Returns whether a row was added.
    pub async fn create_if_missing(
        db: &SqlitePool,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO admins (username, password_hash)
            VALUES (?, ?)
            ON CONFLICT(username) DO NOTHING
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .execute(db)
        .await
        .context("create admin")?;
        Ok(result.rows_affected() == 1)
    }
}

pub async fn revoke_token(db: &SqlitePool, jti: Uuid, expires_at: i64) -> anyhow::Result<()> {
    sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)")
        .bind(jti.to_string())
        .bind(expires_at)
        .execute(db)
        .await
        .context("revoke token")?;
    Ok(())
}

pub async fn is_token_revoked(db: &SqlitePool, jti: Uuid) -> anyhow::Result<bool> {
    let found: Option<(String,)> = sqlx::query_as("SELECT jti FROM revoked_tokens WHERE jti = ?")
        .bind(jti.to_string())
        .fetch_optional(db)
        .await
        .context("check revoked token")?;
    Ok(found.is_some())
}

/// Drops revocations for tokens that have expired anyway.
pub async fn purge_expired_revocations(db: &SqlitePool, now: i64) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
        .bind(now)
        .execute(db)
        .await
        .context("purge revoked tokens")?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_pool;

    #[tokio::test]
    async fn create_if_missing_never_overwrites() {
        let pool = memory_pool().await;
        assert!(Admin::create_if_missing(&pool, "admin", "hash-1").await.unwrap());
        assert!(!Admin::create_if_missing(&pool, "admin", "hash-2").await.unwrap());

        let admin = Admin::find_by_username(&pool, "admin").await.unwrap().unwrap();
        assert_eq!(admin.password_hash, "hash-1");
        assert!(Admin::find_by_username(&pool, "root").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revocations_are_recorded_and_purged() {
        let pool = memory_pool().await;
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        revoke_token(&pool, old, 100).await.unwrap();
        revoke_token(&pool, fresh, 10_000).await.unwrap();
        revoke_token(&pool, fresh, 10_000).await.unwrap();

        assert!(is_token_revoked(&pool, old).await.unwrap());
        assert_eq!(purge_expired_revocations(&pool, 5_000).await.unwrap(), 1);
        assert!(!is_token_revoked(&pool, old).await.unwrap());
        assert!(is_token_revoked(&pool, fresh).await.unwrap());
    }
}
