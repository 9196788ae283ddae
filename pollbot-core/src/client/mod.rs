//! Collaborator seams: the messaging network and the reasoning service
//!
//! Both are consumed as black boxes through `async_trait` traits so that the
//! pipeline can run against the WebSocket bridge and Gemini in production and
//! against in-process mocks in tests.

mod bridge;
mod gemini;
mod messaging;
mod reasoning;

pub use bridge::{BridgeClient, BridgeClientFactory};
pub use gemini::GeminiClient;
pub use messaging::{
    ClientError, ClientFactory, IncomingMessage, MessagingClient, PollContent, QrLogin,
    SignInOutcome,
};
pub use reasoning::{ReasoningClient, ReasoningError};
