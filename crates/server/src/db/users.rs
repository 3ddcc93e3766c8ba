//! User repository.
//!
//! Writes take a `&mut PgConnection` so they compose inside
//! `Database::run_in_transaction`; reads go straight to the pool.

use async_trait::async_trait;
use sellerdesk_core::{Email, ExternalUserId, ProfileId, RolePolicy, UserId, UserRole};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use super::{Database, RepositoryError};
use crate::models::{CurrentUserProfile, ProfileRef, User};

const USER_COLUMNS: &str = "id, external_id, email, role, created_at, updated_at, deleted_at";

/// Result of an identity upsert.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    /// No row existed for the external id; one was inserted.
    Created(User),
    /// A row existed and was updated in place.
    Updated(User),
}

impl UpsertOutcome {
    /// The stored user after the upsert.
    #[must_use]
    pub const fn user(&self) -> &User {
        match self {
            Self::Created(user) | Self::Updated(user) => user,
        }
    }

    /// Whether the upsert inserted a new row.
    #[must_use]
    pub const fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Persistence port used by provisioning and the gate.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create or update the user identified by `external_id`, in one transaction.
    async fn upsert_from_identity(
        &self,
        external_id: &ExternalUserId,
        email: &Email,
        policy: RolePolicy,
    ) -> Result<UpsertOutcome, RepositoryError>;

    /// The user and profile existence for `external_id`, if provisioned.
    async fn current_user_profile(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Option<CurrentUserProfile>, RepositoryError>;
}

#[async_trait]
impl UserStore for Database {
    async fn upsert_from_identity(
        &self,
        external_id: &ExternalUserId,
        email: &Email,
        policy: RolePolicy,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let external_id = external_id.clone();
        let email = email.clone();

        self.run_in_transaction(None, move |tx| {
            let external_id = external_id.clone();
            let email = email.clone();
            Box::pin(async move {
                UserRepository::upsert_in(tx, &external_id, &email, policy).await
            })
        })
        .await
    }

    async fn current_user_profile(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Option<CurrentUserProfile>, RepositoryError> {
        UserRepository::new(self.pool())
            .current_user_profile(external_id)
            .await
    }
}

#[derive(sqlx::FromRow)]
struct CurrentUserRow {
    id: UserId,
    email: Email,
    role: UserRole,
    profile_id: Option<ProfileId>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a live (not soft-deleted) user by external id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(external_id = %external_id))]
    pub async fn get_by_external_id(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1 AND deleted_at IS NULL"
        ))
        .bind(external_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get the user plus profile existence for the gate and `/api/me`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(external_id = %external_id))]
    pub async fn current_user_profile(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Option<CurrentUserProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, CurrentUserRow>(
            r"
            SELECT u.id, u.email, u.role, p.id AS profile_id
            FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE u.external_id = $1 AND u.deleted_at IS NULL
            ",
        )
        .bind(external_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| CurrentUserProfile {
            id: r.id,
            email: r.email,
            role: r.role,
            profile: r.profile_id.map(|id| ProfileRef { id }),
        }))
    }

    /// Count live users. Used by health reporting and the CLI.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Create-or-update keyed by external id, inside the caller's transaction.
    ///
    /// New users get [`UserRole::Seller`]. Existing users get the new email
    /// and the role chosen by `policy`. The external id is never rewritten.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email belongs to another user.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(conn, email), fields(external_id = %external_id))]
    pub async fn upsert_in(
        conn: &mut PgConnection,
        external_id: &ExternalUserId,
        email: &Email,
        policy: RolePolicy,
    ) -> Result<UpsertOutcome, RepositoryError> {
        if let Some(current) = Self::lock_by_external_id(conn, external_id).await? {
            return Self::update_in(conn, &current, email, policy)
                .await
                .map(UpsertOutcome::Updated);
        }

        let inserted = sqlx::query_as::<_, User>(&format!(
            r"
            INSERT INTO users (external_id, email, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(external_id)
        .bind(email)
        .bind(UserRole::Seller)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email"))?;

        if let Some(user) = inserted {
            debug!(user_id = %user.id, "User created");
            return Ok(UpsertOutcome::Created(user));
        }

        // A concurrent delivery inserted the row between our lookup and insert
        let current = Self::lock_by_external_id(conn, external_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Self::update_in(conn, &current, email, policy)
            .await
            .map(UpsertOutcome::Updated)
    }

    /// Id of the live user with `external_id`, locked for the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_id_in(
        conn: &mut PgConnection,
        external_id: &ExternalUserId,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, UserId>(
            "SELECT id FROM users WHERE external_id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(external_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(id)
    }

    async fn lock_by_external_id(
        conn: &mut PgConnection,
        external_id: &ExternalUserId,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1 FOR UPDATE"
        ))
        .bind(external_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }

    async fn update_in(
        conn: &mut PgConnection,
        current: &User,
        email: &Email,
        policy: RolePolicy,
    ) -> Result<User, RepositoryError> {
        let role = policy.role_on_update(current.role);

        let user = sqlx::query_as::<_, User>(&format!(
            r"
            UPDATE users
            SET email = $2, role = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(current.id)
        .bind(email)
        .bind(role)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email"))?;

        debug!(user_id = %user.id, previous_role = %current.role, role = %user.role, "User updated");
        Ok(user)
    }
}
