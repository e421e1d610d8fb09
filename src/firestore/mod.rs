//! Firestore document database over the v1 REST API.

mod client;
pub mod path;
pub mod value;

pub use client::{DocumentPage, DocumentSnapshot, Firestore};
pub use path::{CollectionReference, DocumentReference};

use crate::app::FirebaseApp;
use crate::auth::get_auth;

/// The app's database client, created on first request. Shares the app's `Auth`.
pub fn get_firestore(app: &FirebaseApp) -> Firestore {
    app.firestore_slot()
        .get_or_init(|| Firestore::new(app, get_auth(app)))
        .clone()
}
