//! Seed users from a YAML file.
//!
//! Users go through the same upsert as webhook provisioning, 50 per
//! transaction by default. A failing chunk stops the run; earlier chunks
//! stay committed.
//!
//! ```yaml
//! users:
//!   - external_id: user_seed_001
//!     email: seller1@shop.example
//!   - external_id: user_seed_002
//!     email: seller2@shop.example
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use sellerdesk_core::{Email, ExternalUserId, RolePolicy};
use sellerdesk_server::db::{UserRepository, run_batched};

use super::{CommandError, open_database};

/// Seed file layout.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    /// Users to provision, in order.
    pub users: Vec<SeedUser>,
}

/// One user to provision.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    /// Identity provider id.
    pub external_id: ExternalUserId,
    /// Primary email.
    pub email: Email,
}

/// Totals across all chunks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    /// Chunks committed.
    pub chunks: usize,
    /// Rows inserted.
    pub created: usize,
    /// Rows updated.
    pub updated: usize,
}

/// Parse and validate a seed file.
///
/// # Errors
///
/// Returns `CommandError::InvalidInput` for YAML errors, invalid ids or
/// emails, and duplicate external ids.
pub fn parse(content: &str) -> Result<SeedFile, CommandError> {
    let file: SeedFile =
        serde_yaml::from_str(content).map_err(|e| CommandError::InvalidInput(e.to_string()))?;

    let mut seen = std::collections::HashSet::new();
    for user in &file.users {
        if !seen.insert(user.external_id.as_str()) {
            return Err(CommandError::InvalidInput(format!(
                "duplicate external_id: {}",
                user.external_id
            )));
        }
    }

    Ok(file)
}

/// Upsert every user in `file_path`, `chunk_size` per transaction.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or the first
/// failing chunk's error.
pub async fn users(
    file_path: &str,
    chunk_size: usize,
    policy: &str,
) -> Result<SeedSummary, CommandError> {
    let policy: RolePolicy = policy
        .parse()
        .map_err(|_| CommandError::InvalidInput(format!("unknown role policy: {policy}")))?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(CommandError::InvalidInput(format!(
            "File not found: {file_path}"
        )));
    }

    info!(path = %file_path, "Loading users from file");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CommandError::InvalidInput(e.to_string()))?;
    let file = parse(&content)?;
    info!(users = file.users.len(), chunk_size, "Parsed seed file");

    let db = open_database().await?;

    let per_chunk = run_batched(&file.users, chunk_size, |chunk| {
        let db = db.clone();
        async move {
            db.run_in_transaction(None, move |tx| {
                let chunk = chunk.to_vec();
                Box::pin(async move {
                    let mut created = 0;
                    for user in &chunk {
                        let outcome =
                            UserRepository::upsert_in(tx, &user.external_id, &user.email, policy)
                                .await?;
                        if outcome.was_created() {
                            created += 1;
                        }
                    }
                    Ok((created, chunk.len() - created))
                })
            })
            .await
        }
    })
    .await;

    db.close().await;

    let summary = per_chunk?
        .into_iter()
        .fold(SeedSummary::default(), |acc, (created, updated)| SeedSummary {
            chunks: acc.chunks + 1,
            created: acc.created + created,
            updated: acc.updated + updated,
        });

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_file() {
        let file = parse(
            "users:\n  - external_id: user_1\n    email: One@Shop.Example\n  - external_id: user_2\n    email: two@shop.example\n",
        )
        .unwrap();
        assert_eq!(file.users.len(), 2);
        assert_eq!(file.users[0].email.as_str(), "one@shop.example");
    }

    #[test]
    fn test_parse_rejects_bad_email() {
        let err = parse("users:\n  - external_id: user_1\n    email: nope\n").unwrap_err();
        assert!(matches!(err, CommandError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_rejects_duplicate_ids() {
        let err = parse(
            "users:\n  - external_id: user_1\n    email: a@shop.example\n  - external_id: user_1\n    email: b@shop.example\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate external_id"));
    }
}
