mod cookies;
pub mod google_oauth;
pub mod session;
