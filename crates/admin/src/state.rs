//! Application state shared across handlers.

use std::sync::Arc;

use bazaar_core::token::{DEFAULT_ACCESS_TTL_SECS, TokenKind, TokenSigner};
use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
///
/// Staff sign in through the storefront; this binary only verifies the
/// access tokens it issued, so it holds the access signer and nothing else.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    access_tokens: TokenSigner,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let access_tokens = TokenSigner::new(
            config.jwt_secret.expose_secret().as_bytes(),
            TokenKind::Access,
            DEFAULT_ACCESS_TTL_SECS,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                access_tokens,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Verifier for access tokens issued by the storefront.
    #[must_use]
    pub fn access_tokens(&self) -> &TokenSigner {
        &self.inner.access_tokens
    }
}
