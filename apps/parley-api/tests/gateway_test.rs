mod common;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use common::Client;

#[tokio::test]
async fn identify_then_ready_in_lobby() {
    let addr = common::spawn_app().await;

    let mut client = Client::open(addr).await;
    client.identify("alice").await;
    let ready = client.next_dispatch("READY").await;

    assert_eq!(ready["username"], "alice");
    assert_eq!(ready["room"], "lobby");
    assert!(ready["connection_id"]
        .as_str()
        .unwrap()
        .starts_with("conn_"));
    client.close().await;
}

#[tokio::test]
async fn duplicate_username_is_closed_at_identify() {
    let addr = common::spawn_app().await;

    let alice = Client::connect(addr, "alice").await;

    let mut imposter = Client::open(addr).await;
    imposter.identify("alice").await;
    let reason = imposter.expect_close().await;
    assert!(reason.contains("already taken"), "reason was: {reason}");

    alice.close().await;
}

#[tokio::test]
async fn room_broadcast_reaches_all_members() {
    let addr = common::spawn_app().await;
    let mut alice = Client::connect(addr, "alice").await;
    let mut bob = Client::connect(addr, "bob").await;

    bob.request("SEND_MESSAGE", json!({ "text": "hello room" }))
        .await;

    let msg = alice.next_user_message().await;
    assert_eq!(msg["type"], "chat");
    assert_eq!(msg["sender"], "bob");
    assert_eq!(msg["text"], "hello room");

    // The sender is part of the fan-out too.
    let own = bob.next_user_message().await;
    assert_eq!(own["sender"], "bob");
    assert_eq!(own["text"], "hello room");
}

#[tokio::test]
async fn private_message_reaches_target_only() {
    let addr = common::spawn_app().await;
    let mut alice = Client::connect(addr, "alice").await;
    let mut bob = Client::connect(addr, "bob").await;
    let mut carol = Client::connect(addr, "carol").await;

    bob.request("SEND_MESSAGE", json!({ "text": "/pm alice the secret" }))
        .await;

    let msg = alice.next_user_message().await;
    assert_eq!(msg["type"], "private");
    assert_eq!(msg["sender"], "bob");
    assert_eq!(msg["text"], "the secret");

    // Carol sees the next room-wide chat line, never the PM.
    bob.request("SEND_MESSAGE", json!({ "text": "public line" }))
        .await;
    let next = carol.next_user_message().await;
    assert_eq!(next["type"], "chat");
    assert_eq!(next["text"], "public line");
}

#[tokio::test]
async fn pm_to_unknown_user_reports_error() {
    let addr = common::spawn_app().await;
    let mut bob = Client::connect(addr, "bob").await;

    bob.request("SEND_MESSAGE", json!({ "text": "/pm ghost hello" }))
        .await;

    let err = bob.next_dispatch("ERROR").await;
    assert_eq!(err["code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn join_room_updates_directory() {
    let addr = common::spawn_app().await;
    let mut alice = Client::connect(addr, "alice").await;

    alice.request("JOIN_ROOM", json!({ "room": "games" })).await;
    let result = alice.next_result("JOIN_ROOM").await;
    assert_eq!(result["success"], true);

    let info = alice.next_dispatch("ROOM_INFO").await;
    assert_eq!(info["room"], "games");
    assert_eq!(info["members"], json!(["alice"]));

    alice.request("REQUEST_ROOMS", json!({})).await;
    let rooms = alice.next_dispatch("ROOMS_LIST").await;
    assert_eq!(rooms["games"], json!(["alice"]));
    assert!(rooms.get("lobby").is_some());

    alice.request("GET_USER_INFO", json!({})).await;
    let result = alice.next_result("GET_USER_INFO").await;
    assert_eq!(result["data"]["room"], "games");
}

#[tokio::test]
async fn file_transfer_fans_out_to_room() {
    let addr = common::spawn_app().await;
    let mut alice = Client::connect(addr, "alice").await;
    let mut bob = Client::connect(addr, "bob").await;

    let payload = BASE64.encode(b"pretend this is a png");
    bob.request(
        "SEND_FILE",
        json!({ "filename": "shot.png", "data": payload }),
    )
    .await;
    let result = bob.next_result("SEND_FILE").await;
    assert_eq!(result["success"], true);

    let file = alice.next_dispatch("FILE_RECEIVED").await;
    assert_eq!(file["sender"], "bob");
    assert_eq!(file["filename"], "shot.png");
    assert_eq!(file["filesize"], 21);
    assert_eq!(file["is_image"], true);
    assert!(file["file_url"].as_str().unwrap().starts_with("/files/"));
}

#[tokio::test]
async fn call_ring_accept_hangup() {
    let addr = common::spawn_app().await;
    let mut alice = Client::connect(addr, "alice").await;
    let mut bob = Client::connect(addr, "bob").await;

    alice
        .request("START_CALL", json!({ "username": "bob" }))
        .await;
    let result = alice.next_result("START_CALL").await;
    assert_eq!(result["success"], true);

    let ring = bob.next_dispatch("CALL_INCOMING").await;
    assert_eq!(ring["caller"], "alice");

    bob.request("ACCEPT_CALL", json!({ "caller": "alice" }))
        .await;
    let started = alice.next_dispatch("CALL_STARTED").await;
    assert_eq!(started["partner"], "bob");
    let started = bob.next_dispatch("CALL_STARTED").await;
    assert_eq!(started["partner"], "alice");

    alice.request("END_CALL", json!({})).await;
    let ended = bob.next_dispatch("CALL_ENDED").await;
    assert!(ended["message"].as_str().unwrap().contains("alice"));
}

#[tokio::test]
async fn second_call_to_busy_user_fails() {
    let addr = common::spawn_app().await;
    let mut alice = Client::connect(addr, "alice").await;
    let mut bob = Client::connect(addr, "bob").await;
    let mut carol = Client::connect(addr, "carol").await;

    alice
        .request("START_CALL", json!({ "username": "bob" }))
        .await;
    assert_eq!(alice.next_result("START_CALL").await["success"], true);
    bob.request("ACCEPT_CALL", json!({ "caller": "alice" }))
        .await;

    carol
        .request("START_CALL", json!({ "username": "bob" }))
        .await;
    let result = carol.next_result("START_CALL").await;
    assert_eq!(result["success"], false);
    assert!(result["message"].as_str().unwrap().contains("bob"));
}

#[tokio::test]
async fn disconnect_ends_call_and_announces_leave() {
    let addr = common::spawn_app().await;
    let mut alice = Client::connect(addr, "alice").await;
    let mut bob = Client::connect(addr, "bob").await;

    // Ringing call from alice to bob, then bob vanishes.
    alice
        .request("START_CALL", json!({ "username": "bob" }))
        .await;
    assert_eq!(alice.next_result("START_CALL").await["success"], true);
    bob.next_dispatch("CALL_INCOMING").await;
    bob.close().await;

    let ended = alice.next_dispatch("CALL_ENDED").await;
    assert!(ended["message"].as_str().unwrap().contains("bob"));

    // The lobby hears bob left.
    loop {
        let msg = alice.next_dispatch("MESSAGE").await;
        if msg["type"] == "notification" && msg["text"].as_str().unwrap().contains("bob left") {
            break;
        }
    }

    // The username is free for a new session.
    let bob_again = Client::connect(addr, "bob").await;
    bob_again.close().await;
}
