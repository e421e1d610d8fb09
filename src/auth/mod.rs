//! Authentication: the per-app `Auth` client, the Google provider and the
//! signed-in `User`.

mod client;
mod endpoints;
pub mod provider;
pub mod user;

pub use client::Auth;
pub use provider::{GOOGLE_PROVIDER_ID, GoogleAuthProvider, OAuthCredential};
pub use user::{User, UserCredential, UserProfile};

use crate::app::FirebaseApp;

/// The app's auth client, created on first request.
pub fn get_auth(app: &FirebaseApp) -> Auth {
    app.auth_slot().get_or_init(|| Auth::new(app)).clone()
}
