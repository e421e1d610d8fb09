use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum FirebaseError {
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Firebase app named '{0}' already exists with different options")]
    DuplicateApp(String),

    #[error("No Firebase app '{0}' has been created")]
    NoApp(String),

    #[error("No user is signed in")]
    NoCurrentUser,

    #[error("Invalid document path '{0}'")]
    InvalidPath(String),

    #[error("Document data must be a JSON object")]
    InvalidDocumentData,

    #[error("cookie_secret must be at least 64 bytes")]
    InvalidCookieSecret,

    #[error("OAuth client is not configured")]
    OAuthNotConfigured,

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("Firebase API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("Malformed ID token")]
    MalformedIdToken,
}

impl From<figment::Error> for FirebaseError {
    fn from(e: figment::Error) -> Self {
        FirebaseError::Config(Box::new(e))
    }
}

/// Classifies errors that are worth another attempt.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FirebaseError {
    fn is_retryable(&self) -> bool {
        match self {
            FirebaseError::Reqwest(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS
                    })
            }
            FirebaseError::Api { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

/// Google API error envelope: `{"error": {"code": 400, "message": "EMAIL_NOT_FOUND"}}`.
#[derive(Deserialize, Debug)]
pub struct GoogleApiError {
    pub error: GoogleApiErrorBody,
}

#[derive(Deserialize, Debug)]
pub struct GoogleApiErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl FirebaseError {
    /// Build an error from a non-success response body, falling back to the status line.
    pub fn from_api_body(status: reqwest::StatusCode, body: &[u8]) -> Self {
        match serde_json::from_slice::<GoogleApiError>(body) {
            Ok(api) => FirebaseError::Api {
                code: api.error.code,
                message: api.error.message,
            },
            Err(_) => FirebaseError::Api {
                code: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            },
        }
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for FirebaseError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => FirebaseError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                FirebaseError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                FirebaseError::Json(parse_err.into_inner())
            }
            RequestTokenError::Other(s) => FirebaseError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for FirebaseError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            FirebaseError::NoCurrentUser => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "No user is signed in.".to_string(),
            ),
            FirebaseError::OauthFlow(msg) => (StatusCode::BAD_REQUEST, "OAUTH_FLOW", msg.clone()),
            FirebaseError::OAuthNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "OAUTH_NOT_CONFIGURED",
                "Google sign-in is not configured.".to_string(),
            ),
            FirebaseError::Oauth2Token(_)
            | FirebaseError::Oauth2Server { .. }
            | FirebaseError::MalformedIdToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication error.".to_string(),
            ),
            FirebaseError::Api { code, message } => {
                let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, "UPSTREAM_ERROR", message.clone())
            }
            FirebaseError::Reqwest(_) | FirebaseError::UrlParse(_) => (
                StatusCode::BAD_GATEWAY,
                "BAD_GATEWAY",
                "Upstream service is unavailable.".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred.".to_string(),
            ),
        };
        let body = ApiErrorResponse {
            error: ApiErrorBody {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
