//! Poll response pipeline: cache, delay, vote

pub mod cache;
pub mod delay;
pub mod runner;
pub mod vote;

pub use cache::{CacheStats, PollCache};
pub use delay::response_delay;
pub use runner::{ResponderLoop, ResponsePolicy};
pub use vote::{classify_vote_error, VoteDispatcher};
