use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Token class markers carried in the `typ` claim, so an access token can
/// never pass validation as a refresh token or vice versa.
const TOKEN_CLASS_ACCESS: &str = "access";
const TOKEN_CLASS_REFRESH: &str = "refresh";

/// Issues and validates signed session tokens (HS512).
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Claims for access tokens (short-lived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Home organization ID, when the user has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Token identifier (for revocation)
    pub jti: String,
    /// Token class
    pub typ: String,
}

impl AccessTokenClaims {
    /// Seconds until this token's natural expiry; zero when already past it.
    pub fn remaining_seconds(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Claims for refresh tokens (long-lived, single-use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub typ: String,
}

impl RefreshTokenClaims {
    pub fn remaining_seconds(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Token pair returned to the client.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    /// Issue an access token with a fresh unique identifier.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            org: org_id.map(|id| id.to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: TOKEN_CLASS_ACCESS.to_string(),
        };

        let header = Header::new(Algorithm::HS512);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    /// Issue a refresh token; returns the raw token and its identifier.
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<(String, String), anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(self.refresh_token_expiry_days);
        let jti = Uuid::new_v4().to_string();

        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: jti.clone(),
            typ: TOKEN_CLASS_REFRESH.to_string(),
        };

        let header = Header::new(Algorithm::HS512);
        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))?;

        Ok((token, jti))
    }

    /// Issue a fresh access/refresh pair for a user.
    pub fn issue_token_pair(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> Result<TokenResponse, anyhow::Error> {
        let access_token = self.issue_access_token(user_id, org_id)?;
        let (refresh_token, _jti) = self.issue_refresh_token(user_id)?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry_seconds(),
        })
    }

    /// Verify signature and expiry of an access token. Tampering, a wrong
    /// signature, expiry, or a wrong token class all yield an error, never a
    /// partial result.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, anyhow::Error> {
        let validation = Validation::new(Algorithm::HS512);

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        if token_data.claims.typ != TOKEN_CLASS_ACCESS {
            return Err(anyhow::anyhow!("Not an access token"));
        }

        Ok(token_data.claims)
    }

    /// Verify signature and expiry of a refresh token.
    pub fn validate_refresh_token(
        &self,
        token: &str,
    ) -> Result<RefreshTokenClaims, anyhow::Error> {
        let validation = Validation::new(Algorithm::HS512);

        let token_data = decode::<RefreshTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid refresh token: {}", e))?;

        if token_data.claims.typ != TOKEN_CLASS_REFRESH {
            return Err(anyhow::anyhow!("Not a refresh token"));
        }

        Ok(token_data.claims)
    }

    /// Access token expiry in seconds (for client info).
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    pub fn refresh_token_expiry_days(&self) -> i64 {
        self.refresh_token_expiry_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-test-secret-test-secret-test-secret-test-secret-1234".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    #[test]
    fn access_token_round_trip_preserves_subject_and_class() {
        let service = JwtService::new(&test_config());
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();

        let token = service
            .issue_access_token(user_id, Some(org_id))
            .expect("issue failed");
        let claims = service.validate_access_token(&token).expect("validate failed");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.org, Some(org_id.to_string()));
        assert_eq!(claims.typ, "access");
        assert!(claims.exp > claims.iat);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn refresh_token_round_trip_preserves_identifier() {
        let service = JwtService::new(&test_config());
        let user_id = Uuid::new_v4();

        let (token, jti) = service.issue_refresh_token(user_id).expect("issue failed");
        let claims = service
            .validate_refresh_token(&token)
            .expect("validate failed");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.typ, "refresh");
    }

    #[test]
    fn token_classes_do_not_cross_validate() {
        let service = JwtService::new(&test_config());
        let user_id = Uuid::new_v4();

        let access = service.issue_access_token(user_id, None).unwrap();
        let (refresh, _) = service.issue_refresh_token(user_id).unwrap();

        assert!(service.validate_refresh_token(&access).is_err());
        assert!(service.validate_access_token(&refresh).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let service = JwtService::new(&test_config());
        let token = service.issue_access_token(Uuid::new_v4(), None).unwrap();

        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(service.validate_access_token(&tampered).is_err());
    }

    #[test]
    fn wrong_signing_key_is_rejected() {
        let service = JwtService::new(&test_config());
        let other = JwtService::new(&JwtConfig {
            secret: "another-secret-another-secret-another-secret-another-secret-5678".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        });

        let token = service.issue_access_token(Uuid::new_v4(), None).unwrap();
        assert!(other.validate_access_token(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Negative expiry puts exp well before iat minus the default leeway.
        let service = JwtService::new(&JwtConfig {
            secret: "test-secret-test-secret-test-secret-test-secret-test-secret-1234".to_string(),
            access_token_expiry_minutes: -5,
            refresh_token_expiry_days: 7,
        });

        let token = service.issue_access_token(Uuid::new_v4(), None).unwrap();
        assert!(service.validate_access_token(&token).is_err());
    }
}
