//! Services for pollbot

pub mod logging;

pub use logging::{init_logging, log_reaction};
