//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. Session
//! cookies are signed with a key derived from `SELLERDESK_SESSION_SECRET`.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ServerConfig;
use crate::db::Database;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "sd_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session store over the server's pool.
///
/// The `tower_sessions.session` table is created by the server migrations.
#[must_use]
pub fn create_session_store(db: &Database) -> PostgresStore {
    PostgresStore::new(db.pool().clone())
}

/// Cookie signing key for `config`.
///
/// `Key` needs 64 bytes of material; SHA-512 of the configured secret
/// supplies exactly that.
#[must_use]
pub fn session_key(config: &ServerConfig) -> Key {
    let digest = Sha512::digest(config.session_secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the session layer with `PostgreSQL` store.
///
/// Cookies are signed and marked `Secure` when the base URL is HTTPS.
#[must_use]
pub fn create_session_layer(
    store: PostgresStore,
    config: &ServerConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(session_key(config))
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use secrecy::SecretString;
    use sellerdesk_core::transaction::TransactionOptions;

    use super::*;
    use crate::config::{DatabaseConfig, IdentityConfig};

    fn config_with_secret(secret: &str) -> ServerConfig {
        ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from(secret.to_string()),
            database: DatabaseConfig {
                url: SecretString::from("postgres://localhost/sellerdesk"),
                max_connections: 1,
                transaction: TransactionOptions::default(),
            },
            identity: IdentityConfig::default(),
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_session_key_follows_configured_secret() {
        let one = config_with_secret("kT9#vQ2$mW7!pL4&nR8*xZ1@cF5^hJ3%");
        let two = config_with_secret("Qw8!zX3@rT6#yU1$iO4%pA7^sD2&fG5*");

        assert_eq!(session_key(&one).master(), session_key(&one).master());
        assert_ne!(session_key(&one).master(), session_key(&two).master());
    }
}
