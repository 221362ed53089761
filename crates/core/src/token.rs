//! HS256 JSON Web Tokens for access and refresh sessions.
//!
//! Access tokens and refresh tokens are signed with different secrets and
//! carry a `typ` claim, so one can never be replayed as the other. Only
//! `HS256` is accepted; the header's `alg` is checked before the signature.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::types::{UserId, UserRole};

type HmacSha256 = Hmac<Sha256>;

/// Default access token lifetime (1 day).
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 86_400;

/// Default refresh token lifetime (111 minutes).
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 6_660;

/// Which session a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: UserRole,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Token verification failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("expected {expected:?} token")]
    WrongKind { expected: TokenKind },
    #[error("token signing key is invalid")]
    InvalidKey,
    #[error("token encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Issues and verifies tokens of one [`TokenKind`].
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    kind: TokenKind,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .field("kind", &self.kind)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &[u8], kind: TokenKind, ttl_secs: i64) -> Self {
        Self {
            secret: secret.to_vec(),
            kind,
            ttl_secs,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    #[must_use]
    pub const fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Sign a token for `user` valid from `now` for this signer's TTL.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encoding`] if the claims cannot be serialized.
    pub fn issue(
        &self,
        user_id: UserId,
        email: &str,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: user_id,
            email: email.to_owned(),
            role,
            typ: self.kind,
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = Header {
            alg: "HS256".to_owned(),
            typ: "JWT".to_owned(),
        };
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.mac(signing_input.as_bytes())?);
        Ok(format!("{signing_input}.{signature}"))
    }

    fn mac(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidKey)?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Verify signature, algorithm, kind and expiry.
    ///
    /// # Errors
    ///
    /// Returns the first [`TokenError`] encountered.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidKey)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_segment(claims_b64)?;
        if claims.typ != self.kind {
            return Err(TokenError::WrongKind { expected: self.kind });
        }
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn access() -> TokenSigner {
        TokenSigner::new(b"access-secret-for-tests", TokenKind::Access, 3600)
    }

    #[test]
    fn test_roundtrip() {
        let signer = access();
        let token = signer
            .issue(UserId::new(7), "jane@example.com", UserRole::Manager, now())
            .unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = signer.verify(&token, now()).unwrap();
        assert_eq!(claims.sub, UserId::new(7));
        assert_eq!(claims.email, "jane@example.com");
        assert_eq!(claims.role, UserRole::Manager);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired() {
        let signer = access();
        let token = signer
            .issue(UserId::new(1), "a@b.co", UserRole::Customer, now())
            .unwrap();
        assert!(matches!(
            signer.verify(&token, now() + Duration::seconds(3600)),
            Err(TokenError::Expired)
        ));
        assert!(signer.verify(&token, now() + Duration::seconds(3599)).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = access();
        let token = signer
            .issue(UserId::new(1), "a@b.co", UserRole::Customer, now())
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = Claims {
            sub: UserId::new(1),
            email: "a@b.co".to_owned(),
            role: UserRole::Admin,
            typ: TokenKind::Access,
            iat: now().timestamp(),
            exp: now().timestamp() + 3600,
        };
        let forged_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged_b64, parts[2]);

        assert!(matches!(
            signer.verify(&tampered, now()),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = access()
            .issue(UserId::new(1), "a@b.co", UserRole::Customer, now())
            .unwrap();
        let other = TokenSigner::new(b"different-secret", TokenKind::Access, 3600);
        assert!(matches!(
            other.verify(&token, now()),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_refresh_token_not_accepted_as_access() {
        let secret = b"shared-secret-for-this-test";
        let refresh = TokenSigner::new(secret, TokenKind::Refresh, 600);
        let access = TokenSigner::new(secret, TokenKind::Access, 600);
        let token = refresh
            .issue(UserId::new(1), "a@b.co", UserRole::Customer, now())
            .unwrap();
        assert!(matches!(
            access.verify(&token, now()),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access
            })
        ));
    }

    #[test]
    fn test_alg_none_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let token = format!("{header}.e30.");
        assert!(matches!(
            access().verify(&token, now()),
            Err(TokenError::UnsupportedAlgorithm)
        ));
    }

    #[test]
    fn test_malformed() {
        let signer = access();
        assert!(matches!(signer.verify("", now()), Err(TokenError::Malformed)));
        assert!(matches!(
            signer.verify("a.b", now()),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            signer.verify("a.b.c.d", now()),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", access());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("access-secret"));
    }
}
