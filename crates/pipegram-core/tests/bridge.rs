#![cfg(feature = "http-api")]

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};

use pipegram_core::config::BridgeConfig;
use pipegram_core::error::RemoteError;
use pipegram_core::remote::{BridgePlatform, RemotePlatform, StoryMediaType, VideoTarget};
use pipegram_core::session::SessionRecord;

const API_KEY: &str = "bridge-key";

type Seen = Arc<Mutex<Vec<(String, Value)>>>;

fn reply(status: StatusCode, body: Value) -> (StatusCode, Json<Value>) {
    (status, Json(body))
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {API_KEY}"))
        .unwrap_or(false)
}

async fn fake_login(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return reply(StatusCode::UNAUTHORIZED, json!({"error": "bad api key"}));
    }
    seen.lock().unwrap().push(("login".into(), body.clone()));
    match body["password"].as_str() {
        Some("pw") => reply(
            StatusCode::OK,
            json!({"settings": {"cookies": {"sessionid": "abc"}, "uuids": {"phone_id": "p"}}}),
        ),
        Some("challenge") => reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "challenge_required", "kind": "challenge_required"}),
        ),
        Some("two-factor") => reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "two_factor_required", "kind": "two_factor_required"}),
        ),
        _ => reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "The password you entered is incorrect.", "kind": "bad_password"}),
        ),
    }
}

async fn fake_call(
    State(seen): State<Seen>,
    Path(capability): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return reply(StatusCode::UNAUTHORIZED, json!({"error": "bad api key"}));
    }
    seen.lock().unwrap().push((capability.clone(), body.clone()));
    let args = &body["args"];

    let result = match capability.as_str() {
        "verify" => json!(true),
        "current_user" => json!({
            "pk": 1,
            "username": body["session"]["username"],
            "full_name": "Alice A",
            "profile_pic_url": "https://cdn/alice.jpg"
        }),
        "publish_photo" | "publish_video" => {
            let media = STANDARD.decode(args["media"].as_str().unwrap_or("")).unwrap_or_default();
            json!({
                "pk": 10,
                "id": format!("10_{}", media.len()),
                "code": "abc",
                "media_type": if capability == "publish_photo" { 1 } else { 2 },
                "product_type": args["target"].as_str().unwrap_or("feed"),
            })
        }
        "send_text_message" => json!({"thread_id": format!("t-{}", args["to_username"].as_str().unwrap_or(""))}),
        "send_photo_message" => json!("t-photo"),
        "list_threads" => json!([{
            "thread_id": "t1",
            "thread_title": "bob",
            "users": [{"pk": 2, "username": "bob", "full_name": "Bob", "profile_pic_url": null}],
            "last_permanent_item": {"text": "yo", "timestamp": 1723312800000000i64}
        }]),
        "thread_messages" => json!({"messages": [{"item_id": "i1", "text": "yo"}]}),
        "get_profile" => {
            if args["target_username"] == "ghost" {
                return reply(
                    StatusCode::NOT_FOUND,
                    json!({"error": "User not found", "kind": "not_found"}),
                );
            }
            json!({"pk": "9", "username": args["target_username"], "full_name": "T", "biography": "b", "follower_count": 7})
        }
        "list_stories" => json!({
            "username": "Target",
            "items": [
                {"pk": 1, "media_type": 1, "taken_at": 1723312800, "image_versions2": {"candidates": [{"url": "https://cdn/1.jpg"}]}},
                {"pk": 2, "media_type": 2, "taken_at": 1723312801, "video_versions": [{"url": "https://cdn/2.mp4"}]}
            ]
        }),
        "set_biography" | "change_profile_picture" => Value::Null,
        "rate_limited" => {
            return reply(StatusCode::TOO_MANY_REQUESTS, json!({"error": "Please wait a few minutes"}));
        }
        _ => {
            return reply(StatusCode::BAD_REQUEST, json!({"error": format!("unknown capability {capability}")}));
        }
    };
    reply(StatusCode::OK, json!({ "result": result }))
}

async fn spawn_bridge() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/login", post(fake_login))
        .route("/call/{capability}", post(fake_call))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn platform(url: &str, api_key: Option<&str>) -> BridgePlatform {
    BridgePlatform::new(&BridgeConfig {
        url: url.to_string(),
        api_key: api_key.map(String::from),
        timeout_secs: 5,
    })
    .unwrap()
}

fn session(username: &str) -> SessionRecord {
    let mut settings = Map::new();
    settings.insert("cookies".into(), json!({"sessionid": "abc"}));
    SessionRecord::new(username, settings)
}

#[tokio::test]
async fn test_login_returns_settings() {
    let (url, seen) = spawn_bridge().await;
    let platform = platform(&url, Some(API_KEY));

    let record = platform
        .login("alice", "pw", Some("http://proxy:1"))
        .await
        .unwrap();
    assert_eq!(record.username, "alice");
    assert_eq!(record.proxy.as_deref(), Some("http://proxy:1"));
    assert_eq!(record.settings["cookies"]["sessionid"], "abc");

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "login");
    assert_eq!(seen[0].1["proxy"], "http://proxy:1");
}

#[tokio::test]
async fn test_login_failure_kinds() {
    let (url, _) = spawn_bridge().await;
    let platform = platform(&url, Some(API_KEY));

    let err = platform.login("alice", "wrong", None).await.unwrap_err();
    assert!(matches!(err, RemoteError::BadPassword(_)));
    assert_eq!(err.to_string(), "The password you entered is incorrect.");

    let err = platform.login("alice", "challenge", None).await.unwrap_err();
    assert!(matches!(err, RemoteError::ChallengeRequired(_)));

    let err = platform.login("alice", "two-factor", None).await.unwrap_err();
    assert!(matches!(err, RemoteError::TwoFactorRequired(_)));
}

#[tokio::test]
async fn test_missing_api_key_is_rejected() {
    let (url, _) = spawn_bridge().await;
    let platform = platform(&url, None);
    let err = platform.login("alice", "pw", None).await.unwrap_err();
    assert!(matches!(err, RemoteError::Api { status: 401, .. }));
}

#[tokio::test]
async fn test_client_ships_session_and_shapes_results() {
    let (url, seen) = spawn_bridge().await;
    let platform = platform(&url, Some(API_KEY));
    let client = platform.restore(&session("alice")).await.unwrap();

    client.verify().await.unwrap();
    let me = client.current_user().await.unwrap();
    assert_eq!(me.username, "alice");
    assert_eq!(me.full_name, "Alice A");

    let media = client.publish_photo(b"jpeg-bytes", "caption").await.unwrap();
    assert_eq!(media.id, "10_10");
    assert_eq!(media.media_type, Some(1));

    let media = client
        .publish_video(b"mp4", "", VideoTarget::Reel)
        .await
        .unwrap();
    assert_eq!(media.product_type.as_deref(), Some("reel"));

    let thread_id = client.send_text_message("bob", "hi").await.unwrap();
    assert_eq!(thread_id, "t-bob");
    let thread_id = client.send_photo_message("bob", b"img").await.unwrap();
    assert_eq!(thread_id, "t-photo");

    let threads = client.list_threads().await.unwrap();
    assert_eq!(threads[0].thread_id, "t1");
    assert_eq!(threads[0].users[0].username, "bob");
    assert_eq!(threads[0].last_message.as_deref(), Some("yo"));

    let messages = client.thread_messages("t1").await.unwrap();
    assert_eq!(messages.thread_id, "t1");
    assert_eq!(messages.messages.len(), 1);

    let profile = client.get_profile("target").await.unwrap();
    assert_eq!(profile.username, "target");
    assert_eq!(profile.follower_count, 7);

    let stories = client.list_stories("target").await.unwrap();
    assert_eq!(stories.len(), 2);
    assert_eq!(stories[0].username, "Target");
    assert_eq!(stories[0].media_type, StoryMediaType::Photo);
    assert_eq!(stories[0].media_url.as_deref(), Some("https://cdn/1.jpg"));
    assert_eq!(stories[0].taken_at.as_deref(), Some("2024-08-10T18:00:00.000Z"));
    assert_eq!(stories[1].media_type, StoryMediaType::Video);
    assert_eq!(stories[1].media_url.as_deref(), Some("https://cdn/2.mp4"));

    client.set_biography("new bio").await.unwrap();
    client.change_profile_picture(b"pic").await.unwrap();

    let seen = seen.lock().unwrap();
    let (cap, body) = seen
        .iter()
        .find(|(cap, _)| cap == "publish_photo")
        .unwrap();
    assert_eq!(cap, "publish_photo");
    assert_eq!(body["session"]["username"], "alice");
    assert_eq!(body["session"]["settings"]["cookies"]["sessionid"], "abc");
    assert_eq!(body["args"]["media"], STANDARD.encode(b"jpeg-bytes"));
    assert_eq!(body["args"]["caption"], "caption");

    let (_, body) = seen.iter().find(|(cap, _)| cap == "set_biography").unwrap();
    assert_eq!(body["args"]["biography"], "new bio");
}

#[tokio::test]
async fn test_not_found_kind() {
    let (url, _) = spawn_bridge().await;
    let platform = platform(&url, Some(API_KEY));
    let client = platform.restore(&session("alice")).await.unwrap();

    let err = client.get_profile("ghost").await.unwrap_err();
    assert!(matches!(err, RemoteError::NotFound(_)));
    assert_eq!(err.to_string(), "User not found");
}

#[tokio::test]
async fn test_unreachable_bridge_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let platform = platform(&format!("http://{addr}"), None);
    let err = platform.login("alice", "pw", None).await.unwrap_err();
    assert!(matches!(err, RemoteError::Http(_)));
    assert_eq!(err.code(), "UPSTREAM_ERROR");
}
