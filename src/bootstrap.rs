//! Process-wide client bootstrap: one app, and the three handles derived from it.

use crate::app::{AppOptions, FirebaseApp, initialize_app};
use crate::auth::{Auth, GoogleAuthProvider, get_auth};
use crate::config::{AppConfig, GMAIL_READONLY_SCOPE};
use crate::error::FirebaseError;
use crate::firestore::{Firestore, get_firestore};
use std::sync::OnceLock;
use tracing::info;

static BACKEND: OnceLock<Backend> = OnceLock::new();

/// The auth client, database client and Google provider for the default app.
#[derive(Clone)]
pub struct Backend {
    app: FirebaseApp,
    auth: Auth,
    db: Firestore,
    provider: GoogleAuthProvider,
}

impl Backend {
    /// Build the handles without touching the network.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, FirebaseError> {
        let app = initialize_app(cfg.app.clone(), AppOptions::from(cfg))?;
        let auth = get_auth(&app);
        let db = get_firestore(&app);
        let mut provider = GoogleAuthProvider::new();
        provider.add_scope(GMAIL_READONLY_SCOPE);

        info!(
            project_id = %app.config().project_id,
            scopes = ?provider.scopes(),
            persistence = cfg.auth.persistence_url.is_some(),
            "backend clients ready"
        );
        Ok(Self {
            app,
            auth,
            db,
            provider,
        })
    }

    pub fn app(&self) -> &FirebaseApp {
        &self.app
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn db(&self) -> &Firestore {
        &self.db
    }

    pub fn provider(&self) -> &GoogleAuthProvider {
        &self.provider
    }
}

/// Initialize the process-wide backend. Later calls with the same app record
/// and options return the first instance; anything else is rejected.
pub fn init(cfg: &AppConfig) -> Result<&'static Backend, FirebaseError> {
    if let Some(existing) = BACKEND.get() {
        if existing.app.config() != &cfg.app
            || existing.app.options() != &AppOptions::from(cfg)
        {
            return Err(FirebaseError::DuplicateApp(existing.app.name().to_string()));
        }
        return Ok(existing);
    }
    let backend = Backend::from_config(cfg)?;
    Ok(BACKEND.get_or_init(|| backend))
}

/// The backend, if `init` has run.
pub fn backend() -> Option<&'static Backend> {
    BACKEND.get()
}
