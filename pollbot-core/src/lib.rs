//! # Pollbot Core Library
//!
//! Watches group chats for polls, resolves answers through a reasoning service
//! with multi-key failover, and votes from several accounts at once.

pub mod answer;
pub mod client;
pub mod models;
pub mod providers;
pub mod responder;
pub mod services;
pub mod session;
pub mod supervisor;
