//! HTTP tests for the dashboard router.
//!
//! Requests are driven straight through the router with `oneshot`; no
//! listener or provider account is needed.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use conversation_store::{ConversationStore, Message, MessageStatus};
use dashboard::{AppState, Config};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const TOKEN: &str = "whatsapp_business_verify_token_2024";
const BIZ: &str = "766481149883714";

fn test_app() -> (Router, ConversationStore) {
    let store = ConversationStore::new();
    let state = AppState::new(store.clone(), Config::new(TOKEN, BIZ));
    (dashboard::app(state), store)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send_json(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_raw(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn inbound_delivery() -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "1052392060420311",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "15550000", "phone_number_id": BIZ},
                    "contacts": [{"profile": {"name": "Kerry"}, "wa_id": "16505551234"}],
                    "messages": [{
                        "from": "16505551234",
                        "id": "wamid.IN1",
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": {"body": "Hi, is this open?"}
                    }]
                }
            }]
        }]
    })
}

// ============================================================================
// Webhook verification
// ============================================================================

mod verify_tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_echoes_challenge() {
        let (app, _) = test_app();
        let uri = format!(
            "/api/webhook?hub.mode=subscribe&hub.verify_token={}&hub.challenge=abc123",
            TOKEN
        );

        let response = app.oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, "abc123");
    }

    #[tokio::test]
    async fn test_verify_wrong_token_forbidden() {
        let (app, _) = test_app();
        let uri = "/api/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=abc123";

        let response = app.oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_bytes(response).await;
        assert!(!String::from_utf8_lossy(&body).contains("abc123"));
    }

    #[tokio::test]
    async fn test_verify_wrong_mode_forbidden() {
        let (app, _) = test_app();
        let uri = format!(
            "/api/webhook?hub.mode=unsubscribe&hub.verify_token={}&hub.challenge=abc123",
            TOKEN
        );

        let response = app.oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_verify_missing_params_forbidden() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/api/webhook")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

// ============================================================================
// Webhook deliveries
// ============================================================================

mod delivery_tests {
    use super::*;

    #[tokio::test]
    async fn test_body_without_entry_is_ok_and_inert() {
        let (app, store) = test_app();

        let response = app
            .oneshot(post_raw("/api/webhook", r#"{"object":"whatsapp_business_account"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
        assert!(store.messages(None).is_empty());
        assert!(store.contacts().is_empty());
    }

    #[tokio::test]
    async fn test_mistyped_object_is_ok_and_inert() {
        let (app, store) = test_app();

        let response = app
            .oneshot(post_raw("/api/webhook", r#"{"object":123}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
        assert!(store.messages(None).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deliveries_end_on_latest_snapshot() {
        const DELIVERIES: usize = 16;
        let (app, store) = test_app();
        let mut feed = store.contact_feed(4);

        let mut tasks = Vec::new();
        for n in 0..DELIVERIES {
            let app = app.clone();
            let mut body = inbound_delivery();
            body["entry"][0]["changes"][0]["value"]["messages"][0]["id"] = json!(format!("wamid.IN{n}"));
            tasks.push(tokio::spawn(async move {
                app.oneshot(send_json(Method::POST, "/api/webhook", &body)).await.unwrap().status()
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::OK);
        }

        let contacts = store.contacts();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].unread_count, DELIVERIES as u32);

        let mut latest = None;
        while let Some(snapshot) = feed.try_recv() {
            latest = Some(snapshot);
        }
        let latest = latest.expect("feed should hold a snapshot");
        assert_eq!(latest, contacts);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_generic_500() {
        let (app, store) = test_app();

        let response = app
            .oneshot(post_raw("/api/webhook", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Internal server error"}));
        assert!(store.messages(None).is_empty());
    }

    #[tokio::test]
    async fn test_inbound_message_lands_in_store() {
        let (app, store) = test_app();

        let response = app
            .oneshot(send_json(Method::POST, "/api/webhook", &inbound_delivery()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let messages = store.messages(Some("16505551234"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "wamid.IN1");
        assert_eq!(messages[0].to, BIZ);
        assert!(!messages[0].is_from_user);

        let contacts = store.contacts();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].name, "Contact +16505551234");
        assert_eq!(contacts[0].unread_count, 1);
        assert_eq!(contacts[0].last_message, "Hi, is this open?");
    }

    #[tokio::test]
    async fn test_status_delivery_updates_outbound_message() {
        let (app, store) = test_app();
        store.insert_message(Message::outbound("wamid.OUT", BIZ, "16505551234", "Yes"));

        let delivery = json!({
            "object": "whatsapp_business_account",
            "entry": [{"changes": [{"field": "messages", "value": {
                "statuses": [{"id": "wamid.OUT", "status": "read", "timestamp": "1700000100"}]
            }}]}]
        });

        let response = app
            .oneshot(send_json(Method::POST, "/api/webhook", &delivery))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.messages(None)[0].status, MessageStatus::Read);
        assert_eq!(store.contacts()[0].unread_count, 0);
    }
}

// ============================================================================
// Conversation API
// ============================================================================

mod conversation_tests {
    use super::*;

    #[tokio::test]
    async fn test_compose_records_outbound_message() {
        let (app, store) = test_app();

        let response = app
            .oneshot(send_json(
                Method::POST,
                "/api/messages",
                &json!({"id": "local-1", "to": "16505551234", "text": "Hello there"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["id"], "local-1");
        assert_eq!(body["from"], BIZ);
        assert_eq!(body["status"], "sent");
        assert_eq!(body["type"], "text");
        assert_eq!(body["isFromUser"], true);

        assert_eq!(store.messages(Some("16505551234")).len(), 1);
        assert_eq!(store.contacts()[0].unread_count, 0);
    }

    #[tokio::test]
    async fn test_compose_generates_id() {
        let (app, _) = test_app();

        let response = app
            .oneshot(send_json(
                Method::POST,
                "/api/messages",
                &json!({"to": "16505551234", "text": "Hi", "type": "template"}),
            ))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert!(!body["id"].as_str().unwrap().is_empty());
        assert_eq!(body["type"], "template");
    }

    #[tokio::test]
    async fn test_compose_rejects_blank_text() {
        let (app, store) = test_app();

        let response = app
            .oneshot(send_json(
                Method::POST,
                "/api/messages",
                &json!({"to": "16505551234", "text": "   "}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.messages(None).is_empty());
    }

    #[tokio::test]
    async fn test_list_messages_filters_by_phone() {
        let (app, store) = test_app();
        store.insert_message(Message::inbound("m1", "111", BIZ, "a"));
        store.insert_message(Message::inbound("m2", "222", BIZ, "b"));

        let response = app.clone().oneshot(get("/api/messages?phone=222")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], "m2");

        let response = app.oneshot(get("/api/messages")).await.unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_message_then_not_found() {
        let (app, store) = test_app();
        store.insert_message(Message::outbound("local-1", BIZ, "111", "oops"));

        let response = app
            .clone()
            .oneshot(send_json(Method::DELETE, "/api/messages/local-1", &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["text"], "oops");
        assert!(store.messages(None).is_empty());

        let response = app
            .oneshot(send_json(Method::DELETE, "/api/messages/local-1", &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_status_route() {
        let (app, store) = test_app();
        store.insert_message(Message::outbound("local-1", BIZ, "111", "hi"));

        let response = app
            .clone()
            .oneshot(send_json(
                Method::PUT,
                "/api/messages/local-1/status",
                &json!({"status": "failed"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.messages(None)[0].status, MessageStatus::Failed);

        let response = app
            .oneshot(send_json(
                Method::PUT,
                "/api/messages/local-1/status",
                &json!({"status": "bogus"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_mark_contact_read_route() {
        let (app, store) = test_app();
        store.insert_message(Message::inbound("m1", "111", BIZ, "a"));
        store.insert_message(Message::inbound("m2", "111", BIZ, "b"));

        let response = app
            .clone()
            .oneshot(send_json(Method::POST, "/api/contacts/111/read", &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.contacts()[0].unread_count, 0);

        let response = app
            .oneshot(send_json(Method::POST, "/api/contacts/999/read", &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_contact_search() {
        let (app, store) = test_app();
        store.insert_message(Message::inbound("m1", "15550001", BIZ, "a"));
        store.insert_message(Message::inbound("m2", "447700900", BIZ, "b"));

        let response = app.clone().oneshot(get("/api/contacts?q=4477")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["phone"], "447700900");
        assert_eq!(body[0]["unreadCount"], 1);

        let response = app.oneshot(get("/api/contacts")).await.unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stats_and_health() {
        let (app, store) = test_app();
        store.insert_message(Message::inbound("m1", "111", BIZ, "a"));
        store.insert_message(Message::outbound("m2", BIZ, "111", "b"));

        let response = app.clone().oneshot(get("/api/stats")).await.unwrap();
        let stats = body_json(response).await;
        assert_eq!(stats["totalMessages"], 2);
        assert_eq!(stats["sentMessages"], 1);
        assert_eq!(stats["contactCount"], 1);
        assert_eq!(stats["unreadTotal"], 1);

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"status": "ok", "messages": 2, "contacts": 1})
        );
    }
}

// ============================================================================
// Event stream
// ============================================================================

mod event_stream_tests {
    use super::*;

    async fn next_text(body: &mut Body) -> String {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .unwrap();
        String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_stream_sends_initial_snapshots_then_updates() {
        let (app, store) = test_app();
        store.insert_message(Message::inbound("m1", "111", BIZ, "first"));

        let response = app.oneshot(get("/api/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");

        let mut body = response.into_body();
        let first = next_text(&mut body).await;
        assert!(first.contains("event: messages"));
        assert!(first.contains("\"m1\""));

        let second = next_text(&mut body).await;
        assert!(second.contains("event: contacts"));

        store.update_message_status("m1", MessageStatus::Read);
        let update = next_text(&mut body).await;
        assert!(update.contains("event: messages"));
        assert!(update.contains("\"read\""));
    }
}
