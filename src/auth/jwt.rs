use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::config::JwtConfig;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// A freshly signed bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: OffsetDateTime,
}

/// Signing and verification keys, built once from configuration.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<IssuedToken, TokenError> {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(IssuedToken {
            token,
            issued_at: now,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            ttl_minutes: 5,
            cookie_ttl_hours: 1,
        })
    }

    #[test]
    fn sign_and_verify_token() {
        let keys = make_keys("dev-secret");
        let user_id = Uuid::new_v4();
        let issued = keys.issue(user_id).expect("sign");
        let claims = keys.verify(&issued.token).expect("verify token");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.iat, issued.issued_at.unix_timestamp());
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn verify_rejects_other_secret() {
        let token = make_keys("secret1").issue(Uuid::new_v4()).unwrap().token;
        let err = make_keys("secret2").verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[test]
    fn verify_reports_expiry_separately() {
        let keys = make_keys("dev-secret");
        let long_ago = OffsetDateTime::now_utc() - TimeDuration::hours(1);
        let token = keys.issue_at(Uuid::new_v4(), long_ago).unwrap().token;
        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn verify_rejects_malformed_tokens() {
        let keys = make_keys("dev-secret");
        for token in [
            "",
            "not.a.token",
            "invalid_token_format",
            "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.invalid.signature",
        ] {
            assert!(matches!(keys.verify(token), Err(TokenError::Invalid)));
        }
    }

    #[test]
    fn payload_carries_user_id_under_data() {
        let keys = make_keys("dev-secret");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).unwrap().token;
        let claims: serde_json::Value = {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.leeway = 0;
            decode::<serde_json::Value>(
                &token,
                &DecodingKey::from_secret(b"dev-secret"),
                &validation,
            )
            .unwrap()
            .claims
        };
        assert_eq!(claims["data"], serde_json::json!(user_id.to_string()));
    }

    proptest! {
        #[test]
        fn prop_random_strings_are_rejected(malformed in "[a-zA-Z0-9]{10,50}") {
            let keys = make_keys("dev-secret");
            prop_assert!(keys.verify(&malformed).is_err());
        }
    }
}
