use super::cookies::{PendingSignIn, start_session};
use crate::auth::User;
use crate::error::FirebaseError;
use crate::router::BootstrapState;
use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use oauth2::{AuthorizationCode, PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /auth/google -> redirects to Google's consent page with the provider's scopes.
pub async fn google_oauth_entry(
    State(state): State<BootstrapState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, FirebaseError> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or(FirebaseError::OAuthNotConfigured)?;

    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = state
        .provider
        .authorize_url(oauth, &state.endpoints, challenge)?;

    let pending = PendingSignIn {
        csrf_state: csrf_token.secret().to_owned(),
        pkce_verifier: verifier.secret().to_owned(),
    };
    let jar = pending.store(jar, state.insecure_cookie);

    info!(scopes = ?state.provider.scopes(), "Dispatching Google sign-in redirect");
    Ok((jar, Redirect::temporary(auth_url.as_str())))
}

/// GET /auth/callback -> exchanges the code, signs the user in and starts a
/// cookie session for this browser.
pub async fn google_oauth_callback(
    State(state): State<BootstrapState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (jar, pending) = PendingSignIn::take(jar);
    match finish_sign_in(&state, query, pending).await {
        Ok(user) => {
            let jar = start_session(jar, &user.uid, state.insecure_cookie);
            (jar, Json(user.profile())).into_response()
        }
        Err(err) => (jar, err).into_response(),
    }
}

async fn finish_sign_in(
    state: &BootstrapState,
    query: AuthCallbackQuery,
    pending: Option<PendingSignIn>,
) -> Result<User, FirebaseError> {
    let pending = pending
        .ok_or_else(|| FirebaseError::OauthFlow("no Google sign-in in progress".to_string()))?;

    if let Some(error) = query.error.as_deref() {
        warn!(error, "Google sign-in was not granted");
        return Err(FirebaseError::OauthFlow(format!(
            "authorization denied: {error}"
        )));
    }

    let returned_state = query
        .state
        .ok_or_else(|| FirebaseError::OauthFlow("missing `state` in callback".to_string()))?;
    if !bool::from(
        returned_state
            .as_bytes()
            .ct_eq(pending.csrf_state.as_bytes()),
    ) {
        return Err(FirebaseError::OauthFlow("CSRF token mismatch".to_string()));
    }

    let code = query
        .code
        .ok_or_else(|| FirebaseError::OauthFlow("missing `code` in callback".to_string()))?;
    let oauth = state
        .oauth
        .as_ref()
        .ok_or(FirebaseError::OAuthNotConfigured)?;

    let credential = state
        .provider
        .exchange_code(
            oauth,
            &state.endpoints,
            AuthorizationCode::new(code),
            PkceCodeVerifier::new(pending.pkce_verifier),
            &state.client,
        )
        .await?;
    let signed_in = state.auth.sign_in_with_credential(credential).await?;

    info!(uid = %signed_in.user.uid, new_user = signed_in.is_new_user, "Google sign-in completed");
    Ok(signed_in.user)
}
