use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::error::ClientResult;

/// Claims the dashboard backend puts into its access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Option<String>,
    pub role: Option<String>,
    pub district_code: Option<String>,
    pub user_id: Option<String>,
    pub full_name: Option<String>,
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|at| at <= now).unwrap_or(false)
    }
}

/// Read the claims of a JWT credential without verifying it.
///
/// The client never holds the signing secret; this is for status display
/// only and must not be used to grant anything. Opaque tokens yield `None`.
pub fn inspect_token(token: &str) -> Option<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| tracing::debug!("Credential is not an inspectable JWT: {}", e))
        .ok()
}

/// `Authorization` value for a bearer credential
pub fn bearer_value(token: &str) -> ClientResult<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
    value.set_sensitive(true);
    Ok(value)
}
