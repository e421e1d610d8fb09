pub mod api;
pub mod app;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod firestore;
pub mod handlers;
pub mod router;

pub use app::{FirebaseApp, get_app, initialize_app};
pub use auth::{Auth, GoogleAuthProvider, get_auth};
pub use bootstrap::Backend;
pub use config::{AppConfig, FirebaseConfig};
pub use error::FirebaseError;
pub use firestore::{Firestore, get_firestore};
