//! Integration test: vote submission outcomes.

mod common;

use common::MockMessaging;
use pollbot_core::models::{PollEvent, VoteOutcome};
use pollbot_core::responder::VoteDispatcher;

fn poll() -> PollEvent {
    PollEvent {
        chat_id: -100,
        message_id: 42,
        question: "Capital of France?".to_string(),
        options: vec!["Paris".to_string(), "Lyon".to_string()],
    }
}

#[tokio::test]
async fn test_vote_success() {
    let client = MockMessaging::authorized();
    let dispatcher = VoteDispatcher::new(0, client.clone());

    let outcome = dispatcher.vote(&poll(), 0).await;
    assert_eq!(outcome, VoteOutcome::Success);
    assert_eq!(client.votes(), vec![(-100, 42, 0)]);
}

#[tokio::test]
async fn test_closed_poll_is_already_closed() {
    let client = MockMessaging::authorized();
    *client.vote_error.lock() = Some("MESSAGE_POLL_CLOSED".to_string());
    let dispatcher = VoteDispatcher::new(0, client.clone());

    let outcome = dispatcher.vote(&poll(), 1).await;
    assert_eq!(outcome, VoteOutcome::AlreadyClosed);
    // One-shot: no retry
    assert_eq!(client.calls_named("submit_vote"), 1);
}

#[tokio::test]
async fn test_other_error_is_failed() {
    let client = MockMessaging::authorized();
    *client.vote_error.lock() = Some("FLOOD_WAIT_30".to_string());
    let dispatcher = VoteDispatcher::new(0, client.clone());

    let outcome = dispatcher.vote(&poll(), 1).await;
    assert_eq!(outcome, VoteOutcome::Failed("FLOOD_WAIT_30".to_string()));
    assert_eq!(client.calls_named("submit_vote"), 1);
}

#[tokio::test]
async fn test_out_of_range_option_not_submitted() {
    let client = MockMessaging::authorized();
    let dispatcher = VoteDispatcher::new(0, client.clone());

    let outcome = dispatcher.vote(&poll(), 5).await;
    assert!(matches!(outcome, VoteOutcome::Failed(_)));
    assert_eq!(client.calls_named("submit_vote"), 0);
}
