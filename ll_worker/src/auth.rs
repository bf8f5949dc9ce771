//! ID tokens: HS512 JWTs carrying a user's uid and custom claims.

use std::time::{Duration, SystemTime};

use hmac::Hmac;
use jwt::{SignWithKey, VerifyWithKey};
use ludo_league::db::CustomClaims;
use ludo_league::role::Role;
use rand::{thread_rng, RngCore};
use serde_with::serde_as;
use sha2::Sha512;

use crate::error::ApiError;

/// Key for signing and verifying ID tokens.
pub type JwtKey = Hmac<Sha512>;

/// How long an ID token stays valid.
pub const ID_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// ID token JWT claims.
#[serde_as]
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct JwtIdToken {
    /// Nonce UUID.
    #[serde_as(as = "serde_with::base64::Base64<serde_with::base64::UrlSafe>")]
    nonce: [u8; 16],
    /// Issued-at time.
    #[serde_as(as = "serde_with::TimestampSeconds<i64>")]
    iat: SystemTime,
    /// Expiration time.
    #[serde_as(as = "serde_with::TimestampSeconds<i64>")]
    exp: SystemTime,
    /// Subject, the user's uid.
    sub: String,
    /// Custom claims at the time of issue.
    #[serde(default)]
    claims: CustomClaims,
}

/// The verified caller of a request.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    /// User's uid.
    pub uid: String,
    /// Decoded custom claims.
    pub claims: CustomClaims,
}
impl Identity {
    /// Decoded role claim.
    pub fn role(&self) -> Option<Role> {
        Role::from_claims(&self.claims)
    }

    /// Fails with [`ApiError::Forbidden`] unless the caller is a superadmin.
    pub fn require_superadmin(&self) -> Result<(), ApiError> {
        (self.role() == Some(Role::Superadmin))
            .then_some(())
            .ok_or_else(|| ApiError::Forbidden("Superadmin role required.".to_owned()))
    }
}

/// Create an ID token for `uid`, issued at `now`.
pub fn create_id_token(
    key: &JwtKey,
    now: SystemTime,
    uid: &str,
    claims: CustomClaims,
) -> Result<String, ApiError> {
    let mut nonce = [0; 16];
    thread_rng().fill_bytes(&mut nonce);
    let token = JwtIdToken {
        nonce,
        iat: now,
        exp: now + ID_TOKEN_TTL,
        sub: uid.to_owned(),
        claims,
    };
    token
        .sign_with_key(key)
        .map_err(|e| ApiError::Internal(format!("Failed to sign ID token: {}.", e)))
}

/// Verifies the ID token is correctly signed and valid at `now`.
pub fn verify_id_token(key: &JwtKey, now: SystemTime, token: &str) -> Result<Identity, ApiError> {
    let token: JwtIdToken = token
        .verify_with_key(key)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid ID token: {}.", e)))?;
    // Whole-second timestamps, so `iat == now` is valid.
    if !(token.iat <= now && now < token.exp) {
        return Err(ApiError::Unauthorized("ID token is expired.".to_owned()));
    }
    Ok(Identity {
        uid: token.sub,
        claims: token.claims,
    })
}

/// Verify the bearer token from an `Authorization: Bearer ...` header.
pub fn authenticate(
    key: &JwtKey,
    now: SystemTime,
    bearer: Option<&str>,
) -> Result<Identity, ApiError> {
    let token = bearer
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::Unauthorized("Expected `Authorization: Bearer ...` header.".to_owned())
        })?;
    verify_id_token(key, now, token)
}

#[cfg(test)]
pub(crate) mod test {
    use hmac::Mac;

    use super::*;

    pub(crate) fn test_key() -> JwtKey {
        JwtKey::new_from_slice(&[7; 64]).unwrap()
    }

    pub(crate) fn test_now() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_792_429_200)
    }

    #[test]
    fn test_round_trip_claims() {
        let token =
            create_id_token(&test_key(), test_now(), "alice", Role::MatchAdmin.claims()).unwrap();
        let identity = authenticate(&test_key(), test_now(), Some(&token)).unwrap();
        assert_eq!("alice", identity.uid);
        assert_eq!(Some(Role::MatchAdmin), identity.role());
        assert!(matches!(
            identity.require_superadmin(),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_expired() {
        let token = create_id_token(&test_key(), test_now(), "alice", CustomClaims::new()).unwrap();
        let later = test_now() + ID_TOKEN_TTL;
        assert!(matches!(
            verify_id_token(&test_key(), later, &token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_key() {
        let token = create_id_token(&test_key(), test_now(), "alice", CustomClaims::new()).unwrap();
        let other = JwtKey::new_from_slice(&[8; 64]).unwrap();
        assert!(matches!(
            verify_id_token(&other, test_now(), &token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_missing_bearer() {
        assert!(matches!(
            authenticate(&test_key(), test_now(), None),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&test_key(), test_now(), Some("  ")),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&test_key(), test_now(), Some("not.a.jwt")),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
