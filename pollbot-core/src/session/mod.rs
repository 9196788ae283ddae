//! Account sessions: login with QR and phone fallback

mod manager;

pub use manager::{LoginError, LoginPolicy, SessionManager};
