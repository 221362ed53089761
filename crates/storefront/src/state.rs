//! Application state shared across handlers.

use std::sync::Arc;

use bazaar_core::token::{TokenKind, TokenSigner};
use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    access_tokens: TokenSigner,
    refresh_tokens: TokenSigner,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let access_tokens = TokenSigner::new(
            config.auth.jwt_secret.expose_secret().as_bytes(),
            TokenKind::Access,
            config.auth.access_ttl_secs,
        );
        let refresh_tokens = TokenSigner::new(
            config.auth.refresh_secret.expose_secret().as_bytes(),
            TokenKind::Refresh,
            config.auth.refresh_ttl_secs,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                access_tokens,
                refresh_tokens,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Signer for short-lived access tokens.
    #[must_use]
    pub fn access_tokens(&self) -> &TokenSigner {
        &self.inner.access_tokens
    }

    /// Signer for refresh tokens.
    #[must_use]
    pub fn refresh_tokens(&self) -> &TokenSigner {
        &self.inner.refresh_tokens
    }
}
