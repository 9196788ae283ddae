//! Data models for pollbot

pub mod account;
pub mod configuration;
pub mod credential;
pub mod poll;

pub use account::*;
pub use configuration::*;
pub use credential::*;
pub use poll::*;
