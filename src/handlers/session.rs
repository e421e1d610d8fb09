use super::cookies::{end_session, session_uid};
use crate::auth::{User, UserProfile};
use crate::error::FirebaseError;
use crate::router::BootstrapState;
use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::cookie::PrivateCookieJar;

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

/// GET /auth/me -> profile of the user this browser signed in as, 401 otherwise.
pub async fn current_user(
    State(state): State<BootstrapState>,
    jar: PrivateCookieJar,
) -> Result<Json<UserProfile>, FirebaseError> {
    let user = session_user(&state, &jar)?;
    Ok(Json(user.profile()))
}

/// POST /auth/signout
pub async fn sign_out(
    State(state): State<BootstrapState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, StatusCode), FirebaseError> {
    session_user(&state, &jar)?;
    state.auth.sign_out().await?;
    Ok((end_session(jar), StatusCode::NO_CONTENT))
}

/// The current user, provided the caller's session cookie names them.
fn session_user(state: &BootstrapState, jar: &PrivateCookieJar) -> Result<User, FirebaseError> {
    let uid = session_uid(jar).ok_or(FirebaseError::NoCurrentUser)?;
    state
        .auth
        .current_user()
        .filter(|user| user.uid == uid)
        .ok_or(FirebaseError::NoCurrentUser)
}
