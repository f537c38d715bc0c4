//! Authentication: password hashing, session tokens and the `AuthUser`
//! extractor.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use loyalty_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

// ============================================================================
// Passwords
// ============================================================================

/// Hash a password into an Argon2 PHC string.
///
/// Argon2 is CPU-bound, so the work runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, ApiError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?
}

/// Check a password against a stored PHC string on the blocking pool.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password check task failed: {e}")))
}

fn hash_password_blocking(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password_blocking(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// ============================================================================
// Session Tokens
// ============================================================================

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Expiration time (unix seconds).
    pub exp: u64,
    /// Issued at (unix seconds).
    pub iat: u64,
}

/// HS256 keys for issuing and checking session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: u64,
}

impl SessionKeys {
    /// Build keys from a shared secret.
    #[must_use]
    pub fn new(secret: &[u8], ttl_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_seconds,
        }
    }

    /// Issue a token for `user_id`.
    pub fn issue(&self, user_id: &UserId) -> Result<String, ApiError> {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            exp: now + self.ttl_seconds,
            iat: now,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    /// Check a token and return the user it was issued to.
    pub fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            ApiError::Unauthorized
        })?;

        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)
    }

    /// `Set-Cookie` value carrying `token`.
    #[must_use]
    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
            self.ttl_seconds
        )
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// An authenticated user, from a bearer token or the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or(ApiError::Unauthorized)?;

        let user_id = state.sessions.verify(token)?;

        // Tokens outlive a wiped store in tests and dev runs.
        if state.store.get_user(&user_id).await?.is_none() {
            return Err(ApiError::Unauthorized);
        }

        Ok(Self { user_id })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn cookie_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use axum::http::Request;

    fn parts_with(name: &str, value: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn password_round_trip() {
        let hash = hash_password("hunter2").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash).await.unwrap());
        assert!(!verify_password("hunter3", &hash).await.unwrap());
        assert!(!verify_password("hunter2", "not-a-phc-string").await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_does_not_hold_the_runtime_thread() {
        let other_ran = AtomicBool::new(false);

        let (hash, ()) = tokio::join!(
            async {
                let hash = hash_password("hunter2").await;
                // The sibling branch ran while the hash was computed off-thread.
                assert!(other_ran.load(Ordering::SeqCst));
                hash
            },
            async { other_ran.store(true, Ordering::SeqCst) },
        );
        let hash = hash.unwrap();

        let (verified, ()) = tokio::join!(
            async {
                let verified = verify_password("hunter2", &hash).await;
                assert!(other_ran.swap(false, Ordering::SeqCst));
                verified
            },
            async { other_ran.store(true, Ordering::SeqCst) },
        );
        assert!(verified.unwrap());
    }

    #[test]
    fn token_identifies_user() {
        let keys = SessionKeys::new(b"secret", 3600);
        let user_id = UserId::generate();

        let token = keys.issue(&user_id).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), user_id);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = SessionKeys::new(b"one", 3600)
            .issue(&UserId::generate())
            .unwrap();
        assert!(SessionKeys::new(b"two", 3600).verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = SessionKeys::new(b"secret", 3600);
        let past = u64::try_from(chrono::Utc::now().timestamp()).unwrap() - 120;
        let claims = SessionClaims {
            sub: UserId::generate().to_string(),
            exp: past,
            iat: past - 3600,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn token_is_read_from_bearer_header() {
        let parts = parts_with("authorization", "Bearer abc.def");
        assert_eq!(bearer_token(&parts), Some("abc.def"));

        let parts = parts_with("authorization", "Basic abc");
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn token_is_read_from_cookie() {
        let parts = parts_with("cookie", "theme=dark; session_token=abc.def; lang=en");
        assert_eq!(cookie_token(&parts), Some("abc.def"));

        let parts = parts_with("cookie", "theme=dark");
        assert_eq!(cookie_token(&parts), None);
    }
}
