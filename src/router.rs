use crate::auth::{Auth, GoogleAuthProvider};
use crate::bootstrap::Backend;
use crate::config::{AppConfig, Endpoints, OAuthClientConfig};
use crate::error::FirebaseError;
use crate::handlers::google_oauth::{google_oauth_callback, google_oauth_entry};
use crate::handlers::session::{current_user, healthz, sign_out};
use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;

/// Shared state for the sign-in routes.
#[derive(Clone)]
pub struct BootstrapState {
    pub auth: Auth,
    pub provider: GoogleAuthProvider,
    pub oauth: Option<OAuthClientConfig>,
    pub endpoints: Endpoints,
    pub client: reqwest::Client,
    pub insecure_cookie: bool,
    key: Key,
}

impl BootstrapState {
    pub fn new(backend: &Backend, cfg: &AppConfig) -> Result<Self, FirebaseError> {
        let key = match cfg.server.cookie_secret.as_deref() {
            Some(secret) => {
                Key::try_from(secret.as_bytes()).map_err(|_| FirebaseError::InvalidCookieSecret)?
            }
            None => Key::generate(),
        };
        Ok(Self {
            auth: backend.auth().clone(),
            provider: backend.provider().clone(),
            oauth: cfg.oauth.clone(),
            endpoints: backend.app().endpoints().clone(),
            client: backend.app().http_client(),
            insecure_cookie: cfg.server.insecure_cookie,
            key,
        })
    }
}

impl FromRef<BootstrapState> for Key {
    fn from_ref(state: &BootstrapState) -> Self {
        state.key.clone()
    }
}

pub fn bootstrap_router(state: BootstrapState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/google", get(google_oauth_entry))
        .route("/auth/callback", get(google_oauth_callback))
        .route("/auth/me", get(current_user))
        .route("/auth/signout", post(sign_out))
        .with_state(state)
}
