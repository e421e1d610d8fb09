use crate::error::FirebaseError;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tokens are treated as stale this long before they actually expire.
pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenManager {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenManager {
    pub fn new(id_token: String, refresh_token: String, expires_in: &str) -> Self {
        Self {
            id_token,
            refresh_token,
            expires_at: expiry_from(expires_in, Utc::now()),
        }
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_BUFFER_SECS) >= self.expires_at
    }
}

/// `expiresIn` arrives as a decimal string of seconds. Anything unparseable or
/// out of range counts as one hour.
fn expiry_from(expires_in: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    expires_in
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or_else(|| now + Duration::hours(1))
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider_id: String,
    pub email_verified: bool,
    pub is_anonymous: bool,
    pub tokens: TokenManager,
}

/// Public view of a user, without tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider_id: String,
    pub email_verified: bool,
    pub is_anonymous: bool,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            provider_id: self.provider_id.clone(),
            email_verified: self.email_verified,
            is_anonymous: self.is_anonymous,
        }
    }

    /// Decoded ID-token payload. The signature is not verified.
    pub fn claims(&self) -> Result<Value, FirebaseError> {
        decode_jwt_payload(&self.tokens.id_token)
    }
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub user: User,
    pub provider_id: Option<String>,
    /// Provider access token, carrying whatever scopes the provider granted.
    pub oauth_access_token: Option<String>,
    pub is_new_user: bool,
}

pub(crate) fn decode_jwt_payload(token: &str) -> Result<Value, FirebaseError> {
    let Some(payload_b64) = token.split('.').nth(1) else {
        return Err(FirebaseError::MalformedIdToken);
    };
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .map_err(|_| FirebaseError::MalformedIdToken)?;
    serde_json::from_slice::<Value>(&decoded).map_err(|_| FirebaseError::MalformedIdToken)
}
