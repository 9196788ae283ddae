//! Integration test: bridge client against a loopback WebSocket gateway.

use futures_util::{SinkExt, StreamExt};
use pollbot_core::client::{BridgeClient, ClientError, MessagingClient, SignInOutcome};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};

/// Minimal gateway: answers each request and pushes one poll after `subscribe`.
async fn spawn_gateway() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind gateway");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("failed to accept");
        let ws = accept_async(stream).await.expect("failed to upgrade");
        let (mut sender, mut receiver) = ws.split();

        while let Some(Ok(WsMessage::Text(text))) = receiver.next().await {
            let request: Value = serde_json::from_str(&text).unwrap();
            let id = request["id"].clone();
            let params = &request["params"];
            let reply = match request["method"].as_str().unwrap_or("") {
                "connect" => {
                    assert!(params["session"].as_str().unwrap().ends_with("user3.session"));
                    json!({ "id": id, "result": null })
                }
                "is_authorized" => json!({ "id": id, "result": true }),
                "qr_login" => json!({ "id": id, "result": { "token": "t1", "url": "tg://login?token=t1" } }),
                "qr_wait" => json!({ "id": id, "result": null }),
                "sign_in" => json!({ "id": id, "error": "SESSION_PASSWORD_NEEDED" }),
                "dialogs" => json!({ "id": id, "result": [
                    { "id": -5, "name": "Quiz", "username": "quiz" },
                    { "id": 7, "name": "Alice" }
                ] }),
                "subscribe" => json!({ "id": id, "result": null }),
                "vote" if params["option"] == json!(9) => {
                    json!({ "id": id, "error": "MESSAGE_POLL_CLOSED" })
                }
                "vote" => json!({ "id": id, "result": true }),
                "disconnect" => {
                    let reply = json!({ "id": id, "result": null });
                    let _ = sender.send(WsMessage::Text(reply.to_string())).await;
                    let _ = sender.close().await;
                    break;
                }
                // Never answered: exercises the request timeout
                "send_code" => continue,
                other => json!({ "id": id, "error": format!("unknown method {}", other) }),
            };
            sender.send(WsMessage::Text(reply.to_string())).await.unwrap();

            if request["method"] == "subscribe" {
                let chats = params["chats"].as_array().unwrap();
                let event = json!({
                    "event": "new_message",
                    "data": {
                        "chat_id": chats[0],
                        "message_id": 77,
                        "poll": { "question": "1+1=?", "options": ["1", "2"] }
                    }
                });
                sender.send(WsMessage::Text(event.to_string())).await.unwrap();
                let other_chat = json!({
                    "event": "new_message",
                    "data": { "chat_id": 12345, "message_id": 1 }
                });
                sender.send(WsMessage::Text(other_chat.to_string())).await.unwrap();
            }
        }
    });

    format!("ws://{}", addr)
}

#[tokio::test]
async fn test_bridge_round_trip() {
    let url = spawn_gateway().await;
    let client = BridgeClient::new(
        &url,
        3,
        "sessions/user3.session",
        Duration::from_millis(500),
    )
    .unwrap();

    client.connect().await.unwrap();
    assert!(client.is_authorized().await.unwrap());

    let qr = client.request_qr_login().await.unwrap();
    assert_eq!(qr.url(), "tg://login?token=t1");
    qr.wait().await.unwrap();

    assert_eq!(
        client.sign_in("+15550100", "12345").await.unwrap(),
        SignInOutcome::PasswordRequired
    );
    assert!(matches!(
        client.send_code("+15550100").await,
        Err(ClientError::Timeout(_))
    ));

    let dialogs = client.dialogs().await.unwrap();
    assert_eq!(dialogs.len(), 2);
    assert_eq!(dialogs[0].username.as_deref(), Some("quiz"));
    assert_eq!(dialogs[1].username, None);

    let mut events = client.subscribe(HashSet::from([-5])).await.unwrap();
    let message = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    let poll = message.poll_event().unwrap();
    assert_eq!((poll.chat_id, poll.message_id), (-5, 77));
    assert_eq!(poll.options, vec!["1".to_string(), "2".to_string()]);

    client.submit_vote(-5, 77, 1).await.unwrap();
    let closed = client.submit_vote(-5, 77, 9).await.unwrap_err();
    assert_eq!(closed.to_string(), "MESSAGE_POLL_CLOSED");

    client.disconnect().await.unwrap();
    // Subscription ends with the connection; the unrelated chat was never delivered
    let tail = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap();
    assert!(tail.is_none());
    assert!(matches!(
        client.is_authorized().await,
        Err(ClientError::NotConnected)
    ));
}
