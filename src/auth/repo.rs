use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::service::LOCKOUT_THRESHOLD;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, phone_number, failed_attempts, verification_code, created_at";

/// User record as stored. The hash never leaves the process in JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone_number: String,
    pub failed_attempts: i32,
    pub verification_code: Option<String>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Login is refused while the counter sits at or above the threshold.
    pub fn is_locked(&self) -> bool {
        self.failed_attempts >= LOCKOUT_THRESHOLD
    }

    /// A reset code has been issued and not yet redeemed.
    pub fn has_pending_reset(&self) -> bool {
        self.verification_code.is_some()
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_phone(db: &PgPool, phone_number: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_verification_code(db: &PgPool, code: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE verification_code = $1"
        ))
        .bind(code)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> AuthResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(user)
    }

    /// Insert a fresh record. Uniqueness is enforced by the DB constraints,
    /// not only the service-level pre-check, so concurrent signups with the
    /// same email or phone cannot both succeed.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        phone_number: &str,
    ) -> AuthResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, phone_number)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(phone_number)
        .fetch_one(db)
        .await
        .map_err(map_unique_violation)
    }

    /// Single-statement increment returning the new count, so concurrent
    /// failed logins cannot lose updates to a read-modify-write race.
    pub async fn record_failed_login(db: &PgPool, id: Uuid) -> AuthResult<i32> {
        let count: i32 = sqlx::query_scalar(
            "UPDATE users SET failed_attempts = failed_attempts + 1 WHERE id = $1 RETURNING failed_attempts",
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn reset_failed_attempts(db: &PgPool, id: Uuid) -> AuthResult<()> {
        sqlx::query("UPDATE users SET failed_attempts = 0 WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Overwrites any pending code.
    pub async fn set_verification_code(
        db: &PgPool,
        id: Uuid,
        code: Option<&str>,
    ) -> AuthResult<()> {
        sqlx::query("UPDATE users SET verification_code = $2 WHERE id = $1")
            .bind(id)
            .bind(code)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Redeem a reset code: set the new hash and clear the code in one
    /// statement, making the code single-use even under concurrent
    /// redemption attempts. Returns the affected user id, if any code
    /// matched.
    pub async fn redeem_verification_code(
        db: &PgPool,
        code: &str,
        new_password_hash: &str,
    ) -> AuthResult<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET password_hash = $2, verification_code = NULL
            WHERE verification_code = $1
            RETURNING id
            "#,
        )
        .bind(code)
        .bind(new_password_hash)
        .fetch_optional(db)
        .await?;
        Ok(id)
    }
}

fn map_unique_violation(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some("users_email_key") => return AuthError::DuplicateEmail,
            Some("users_phone_number_key") => return AuthError::DuplicatePhone,
            _ => {}
        }
    }
    AuthError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(failed_attempts: i32, verification_code: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$fake".into(),
            phone_number: "1234567890".into(),
            failed_attempts,
            verification_code: verification_code.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn locked_at_threshold_and_above() {
        assert!(!user_with(0, None).is_locked());
        assert!(!user_with(2, None).is_locked());
        assert!(user_with(3, None).is_locked());
        assert!(user_with(7, None).is_locked());
    }

    #[test]
    fn pending_reset_tracks_code_presence() {
        assert!(!user_with(0, None).has_pending_reset());
        assert!(user_with(0, Some("ABC123")).has_pending_reset());
    }

    #[test]
    fn password_hash_never_serializes() {
        let json = serde_json::to_string(&user_with(0, None)).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2"));
    }

    #[sqlx::test]
    async fn redeemed_code_is_single_use(pool: PgPool) {
        let user = User::create(&pool, "Alice", "alice@example.com", "$argon2id$old", "1234567890")
            .await
            .expect("create user");
        User::set_verification_code(&pool, user.id, Some("ABC123"))
            .await
            .expect("set code");

        let redeemed = User::redeem_verification_code(&pool, "ABC123", "$argon2id$new")
            .await
            .expect("redeem code");
        assert_eq!(redeemed, Some(user.id));

        let updated = User::find_by_id(&pool, user.id)
            .await
            .expect("find user")
            .expect("user exists");
        assert_eq!(updated.password_hash, "$argon2id$new");
        assert!(!updated.has_pending_reset());

        // The same code a second time matches nothing.
        let replay = User::redeem_verification_code(&pool, "ABC123", "$argon2id$other")
            .await
            .expect("redeem again");
        assert_eq!(replay, None);

        let after = User::find_by_id(&pool, user.id)
            .await
            .expect("find user")
            .expect("user exists");
        assert_eq!(after.password_hash, "$argon2id$new");
    }

    #[sqlx::test]
    async fn insert_with_taken_email_maps_to_duplicate_email(pool: PgPool) {
        User::create(&pool, "Alice", "alice@example.com", "$argon2id$fake", "1234567890")
            .await
            .expect("create user");

        // Unique phone, colliding email: the constraint fires and maps up.
        let err = User::create(&pool, "Alicia", "alice@example.com", "$argon2id$fake", "0987654321")
            .await
            .expect_err("duplicate email should fail");
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[sqlx::test]
    async fn insert_with_taken_phone_maps_to_duplicate_phone(pool: PgPool) {
        User::create(&pool, "Alice", "alice@example.com", "$argon2id$fake", "1234567890")
            .await
            .expect("create user");

        let err = User::create(&pool, "Bob", "bob@example.com", "$argon2id$fake", "1234567890")
            .await
            .expect_err("duplicate phone should fail");
        assert!(matches!(err, AuthError::DuplicatePhone));
    }

    #[sqlx::test]
    async fn failed_login_increment_returns_new_count(pool: PgPool) {
        let user = User::create(&pool, "Alice", "alice@example.com", "$argon2id$fake", "1234567890")
            .await
            .expect("create user");

        assert_eq!(User::record_failed_login(&pool, user.id).await.expect("inc"), 1);
        assert_eq!(User::record_failed_login(&pool, user.id).await.expect("inc"), 2);
        assert_eq!(User::record_failed_login(&pool, user.id).await.expect("inc"), 3);

        User::reset_failed_attempts(&pool, user.id)
            .await
            .expect("reset");
        let fresh = User::find_by_id(&pool, user.id)
            .await
            .expect("find user")
            .expect("user exists");
        assert_eq!(fresh.failed_attempts, 0);
        assert!(!fresh.is_locked());
    }
}
