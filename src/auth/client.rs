use super::endpoints::{IdentityContext, IdentityEndpoints, SignInResponse};
use super::provider::OAuthCredential;
use super::user::{TokenManager, User, UserCredential};
use crate::app::FirebaseApp;
use crate::db::{DbSession, SessionStorage};
use crate::error::FirebaseError;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

/// `requestUri` sent with `signInWithIdp` when the tokens were obtained server-side.
const IDP_REQUEST_URI: &str = "http://localhost";

/// Authentication client bound to one app.
///
/// Holds at most one signed-in user. Nothing touches the network until a
/// sign-in or token operation is called.
#[derive(Clone)]
pub struct Auth {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    app_name: String,
    ctx: IdentityContext,
    state: watch::Sender<Option<User>>,
    refresh_lock: Mutex<()>,
    persistence: Option<SessionStorage>,
}

impl Auth {
    pub(crate) fn new(app: &FirebaseApp) -> Self {
        let (state, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(AuthInner {
                app_name: app.name().to_string(),
                ctx: IdentityContext {
                    api_key: app.config().api_key.clone(),
                    endpoints: app.endpoints().clone(),
                    http: app.http_client(),
                },
                state,
                refresh_lock: Mutex::new(()),
                persistence: app.persistence(),
            }),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.inner.app_name
    }

    pub fn ptr_eq(&self, other: &Auth) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.state.borrow().clone()
    }

    /// Notified on sign-in, sign-out and token refresh.
    pub fn on_auth_state_changed(&self) -> watch::Receiver<Option<User>> {
        self.inner.state.subscribe()
    }

    pub async fn sign_in_with_credential(
        &self,
        credential: OAuthCredential,
    ) -> Result<UserCredential, FirebaseError> {
        let resp = IdentityEndpoints::sign_in_with_idp(
            &self.inner.ctx,
            credential.to_post_body(),
            IDP_REQUEST_URI.to_string(),
        )
        .await?;
        let provider_id = resp
            .provider_id
            .clone()
            .unwrap_or_else(|| credential.provider_id.clone());
        self.complete_sign_in(resp, provider_id, false).await
    }

    pub async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserCredential, FirebaseError> {
        let resp = IdentityEndpoints::sign_in_with_password(&self.inner.ctx, email, password).await?;
        self.complete_sign_in(resp, "password".to_string(), false)
            .await
    }

    pub async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserCredential, FirebaseError> {
        let resp = IdentityEndpoints::sign_up(&self.inner.ctx, Some(email), Some(password)).await?;
        self.complete_sign_in(resp, "password".to_string(), false)
            .await
    }

    pub async fn sign_in_anonymously(&self) -> Result<UserCredential, FirebaseError> {
        if let Some(user) = self.current_user().filter(|u| u.is_anonymous) {
            debug!(uid = %user.uid, "already signed in anonymously");
            return Ok(UserCredential {
                user,
                provider_id: None,
                oauth_access_token: None,
                is_new_user: false,
            });
        }
        let resp = IdentityEndpoints::sign_up(&self.inner.ctx, None, None).await?;
        self.complete_sign_in(resp, "firebase".to_string(), true)
            .await
    }

    pub async fn send_password_reset_email(&self, email: &str) -> Result<(), FirebaseError> {
        IdentityEndpoints::send_password_reset(&self.inner.ctx, email).await
    }

    pub async fn sign_out(&self) -> Result<(), FirebaseError> {
        let previous = self.inner.state.send_replace(None);
        if let Some(user) = previous {
            info!(uid = %user.uid, app = %self.inner.app_name, "signed out");
        }
        self.clear_persisted().await
    }

    /// Current ID token, refreshed when forced or close to expiry.
    pub async fn id_token(&self, force_refresh: bool) -> Result<String, FirebaseError> {
        let _guard = self.inner.refresh_lock.lock().await;
        let user = self.current_user().ok_or(FirebaseError::NoCurrentUser)?;
        if !force_refresh && !user.tokens.needs_refresh(Utc::now()) {
            return Ok(user.tokens.id_token);
        }

        let refreshed =
            IdentityEndpoints::refresh_token(&self.inner.ctx, &user.tokens.refresh_token).await?;
        let tokens = TokenManager::new(
            refreshed.id_token,
            refreshed.refresh_token,
            &refreshed.expires_in,
        );
        let id_token = tokens.id_token.clone();

        let updated = self.inner.state.send_if_modified(|current| match current {
            Some(u) if u.uid == user.uid => {
                u.tokens = tokens;
                true
            }
            _ => false,
        });
        if updated {
            self.persist_current().await;
        } else {
            debug!(uid = %user.uid, "user changed during refresh; dropping refreshed tokens");
        }
        Ok(id_token)
    }

    /// Re-fetch profile fields for the current user.
    pub async fn reload_user(&self) -> Result<User, FirebaseError> {
        let id_token = self.id_token(false).await?;
        let info = IdentityEndpoints::lookup(&self.inner.ctx, &id_token).await?;
        let mut reloaded = None;
        self.inner.state.send_if_modified(|current| match current {
            Some(u) if u.uid == info.local_id => {
                u.email = info.email.clone();
                u.display_name = info.display_name.clone();
                u.photo_url = info.photo_url.clone();
                u.email_verified = info.email_verified;
                reloaded = Some(u.clone());
                true
            }
            _ => false,
        });
        let user = reloaded.ok_or(FirebaseError::NoCurrentUser)?;
        self.persist_current().await;
        Ok(user)
    }

    /// Delete the current account, then sign out.
    pub async fn delete_user(&self) -> Result<(), FirebaseError> {
        let id_token = self.id_token(false).await?;
        IdentityEndpoints::delete_account(&self.inner.ctx, &id_token).await?;
        self.sign_out().await
    }

    /// Load a saved session into memory. Returns the restored user, if any.
    pub async fn restore_persisted_user(&self) -> Result<Option<User>, FirebaseError> {
        let Some(storage) = self.inner.persistence.as_ref() else {
            return Ok(None);
        };
        let Some(session) = storage.load(&self.storage_key()).await? else {
            return Ok(None);
        };
        let user = session.into_user()?;
        info!(uid = %user.uid, app = %self.inner.app_name, "restored persisted session");
        self.inner.state.send_replace(Some(user.clone()));
        Ok(Some(user))
    }

    /// `firebase:authUser:{api_key}:{app_name}`
    pub fn storage_key(&self) -> String {
        format!(
            "firebase:authUser:{}:{}",
            self.inner.ctx.api_key, self.inner.app_name
        )
    }

    async fn complete_sign_in(
        &self,
        resp: SignInResponse,
        provider_id: String,
        is_anonymous: bool,
    ) -> Result<UserCredential, FirebaseError> {
        let user = User {
            uid: resp.local_id,
            email: resp.email,
            display_name: resp.display_name,
            photo_url: resp.photo_url,
            provider_id: provider_id.clone(),
            email_verified: resp.email_verified.unwrap_or(false),
            is_anonymous,
            tokens: TokenManager::new(resp.id_token, resp.refresh_token, &resp.expires_in),
        };
        info!(uid = %user.uid, provider = %provider_id, app = %self.inner.app_name, "signed in");

        self.inner.state.send_replace(Some(user.clone()));
        if let Some(storage) = self.inner.persistence.as_ref() {
            storage
                .save(DbSession::new(self.storage_key(), &user)?)
                .await?;
        }

        Ok(UserCredential {
            user,
            provider_id: Some(provider_id),
            oauth_access_token: resp.oauth_access_token,
            is_new_user: resp.is_new_user.unwrap_or(is_anonymous),
        })
    }

    async fn persist_current(&self) {
        let (Some(storage), Some(user)) = (self.inner.persistence.as_ref(), self.current_user())
        else {
            return;
        };
        let saved = match DbSession::new(self.storage_key(), &user) {
            Ok(session) => storage.save(session).await,
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            warn!(uid = %user.uid, error = %e, "failed to persist refreshed session");
        }
    }

    async fn clear_persisted(&self) -> Result<(), FirebaseError> {
        match self.inner.persistence.as_ref() {
            Some(storage) => storage.remove(&self.storage_key()).await,
            None => Ok(()),
        }
    }
}
