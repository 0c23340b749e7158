mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use huddle_api::realtime::ResourceKind;
use serde_json::{json, Value};

#[tokio::test]
async fn create_channel_notifies_workspace() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let (_sub, mut rx) =
        common::listen(&state, ResourceKind::Workspace, &ws.workspace_id, &ws.owner_id).await;

    let resp = server
        .post(&format!("/api/v1/workspaces/{}/channels", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "random", "description": "  off topic " }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let channel: Value = resp.json();
    assert_eq!(channel["name"], "random");
    assert_eq!(channel["description"], "off topic");
    assert_eq!(channel["workspaceId"], ws.workspace_id.as_str());

    let event = common::next_event(&mut rx).unwrap();
    assert_eq!(event, json!({ "type": "CHANNEL_CREATED", "channel": channel }));
}

#[tokio::test]
async fn create_channel_validates_name_and_membership() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let outsider = common::token_for(&state, "usr_outsider").await;

    let resp = server
        .post(&format!("/api/v1/workspaces/{}/channels", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "Not A Slug" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["details"][0]["field"], "name");

    server
        .post(&format!("/api/v1/workspaces/{}/channels", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&outsider))
        .json(&json!({ "name": "sneaky" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post("/api/v1/workspaces/ws_missing/channels")
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "lost" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rename_channel_notifies_workspace() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let channel = state
        .store
        .create_channel(&ws.workspace_id, "random", None)
        .await
        .unwrap();
    let (_sub, mut rx) =
        common::listen(&state, ResourceKind::Workspace, &ws.workspace_id, &ws.owner_id).await;

    let resp = server
        .patch(&format!("/api/v1/channels/{}", channel.id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "watercooler" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["name"], "watercooler");

    let event = common::next_event(&mut rx).unwrap();
    assert_eq!(event["type"], "CHANNEL_UPDATED");
    assert_eq!(event["channel"]["id"], channel.id.as_str());
    assert_eq!(event["channel"]["name"], "watercooler");
}

#[tokio::test]
async fn general_channel_is_protected() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let (_sub, mut rx) =
        common::listen(&state, ResourceKind::Workspace, &ws.workspace_id, &ws.owner_id).await;

    server
        .patch(&format!("/api/v1/channels/{}", ws.general_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "lobby" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .delete(&format!("/api/v1/channels/{}", ws.general_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    assert!(common::next_event(&mut rx).is_none());
    assert!(state.store.find_channel(&ws.general_id).await.unwrap().is_some());
}

#[tokio::test]
async fn delete_channel_points_clients_to_general() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let channel = state
        .store
        .create_channel(&ws.workspace_id, "random", None)
        .await
        .unwrap();
    let (_sub, mut rx) =
        common::listen(&state, ResourceKind::Workspace, &ws.workspace_id, &ws.owner_id).await;

    server
        .delete(&format!("/api/v1/channels/{}", channel.id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let event = common::next_event(&mut rx).unwrap();
    assert_eq!(
        event,
        json!({
            "type": "CHANNEL_DELETED",
            "channelId": channel.id,
            "generalChannelId": ws.general_id,
        })
    );
    assert!(state.store.find_channel(&channel.id).await.unwrap().is_none());
}

#[tokio::test]
async fn general_name_is_reserved() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let random = state
        .store
        .create_channel(&ws.workspace_id, "random", None)
        .await
        .unwrap();
    let (_sub, mut rx) =
        common::listen(&state, ResourceKind::Workspace, &ws.workspace_id, &ws.owner_id).await;

    server
        .post(&format!("/api/v1/workspaces/{}/channels", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "general" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .patch(&format!("/api/v1/channels/{}", random.id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "general" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert!(common::next_event(&mut rx).is_none());
    let random = state.store.find_channel(&random.id).await.unwrap().unwrap();
    assert_eq!(random.name, "random");

    // Deleting it still works, since it never became a second general.
    server
        .delete(&format!("/api/v1/channels/{}", random.id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn duplicate_channel_names_conflict() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let dev = state
        .store
        .create_channel(&ws.workspace_id, "dev", None)
        .await
        .unwrap();
    state
        .store
        .create_channel(&ws.workspace_id, "random", None)
        .await
        .unwrap();
    let (_sub, mut rx) =
        common::listen(&state, ResourceKind::Workspace, &ws.workspace_id, &ws.owner_id).await;

    let resp = server
        .post(&format!("/api/v1/workspaces/{}/channels", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "random" }))
        .await;
    resp.assert_status(StatusCode::CONFLICT);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "CONFLICT");

    server
        .patch(&format!("/api/v1/channels/{}", dev.id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "random" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    assert!(common::next_event(&mut rx).is_none());
}

#[tokio::test]
async fn list_channels_returns_workspace_channels_for_members() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let random = state
        .store
        .create_channel(&ws.workspace_id, "random", None)
        .await
        .unwrap();
    let outsider = common::token_for(&state, "usr_outsider").await;

    let resp = server
        .get(&format!("/api/v1/workspaces/{}/channels", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![ws.general_id.as_str(), random.id.as_str()]);
    assert_eq!(body[0]["type"], "PUBLIC");

    server
        .get(&format!("/api/v1/workspaces/{}/channels", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&outsider))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .get("/api/v1/workspaces/ws_missing/channels")
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Direct messages
// ---------------------------------------------------------------------------

async fn listed_channel_ids(server: &TestServer, workspace_id: &str, token: &str) -> Vec<String> {
    let resp = server
        .get(&format!("/api/v1/workspaces/{workspace_id}/channels"))
        .add_header(AUTHORIZATION, common::bearer(token))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    body.as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn open_dm_creates_once_and_announces() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let (friend_id, friend_token) = common::add_member(&state, &ws.workspace_id).await;
    let (_sub, mut rx) =
        common::listen(&state, ResourceKind::Workspace, &ws.workspace_id, &ws.owner_id).await;

    let resp = server
        .post(&format!("/api/v1/workspaces/{}/dm", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "userId": friend_id }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let dm: Value = resp.json();
    assert_eq!(dm["type"], "DM");
    let mut pair = [ws.owner_id.as_str(), friend_id.as_str()];
    pair.sort();
    assert_eq!(dm["name"], format!("DM:{}-{}", pair[0], pair[1]));

    let event = common::next_event(&mut rx).unwrap();
    assert_eq!(event, json!({ "type": "CHANNEL_CREATED", "channel": dm }));

    // The other side opening the same conversation gets the existing channel.
    let resp = server
        .post(&format!("/api/v1/workspaces/{}/dm", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&friend_token))
        .json(&json!({ "userId": ws.owner_id }))
        .await;
    resp.assert_status_ok();
    let again: Value = resp.json();
    assert_eq!(again["id"], dm["id"]);
    assert!(common::next_event(&mut rx).is_none());
}

#[tokio::test]
async fn open_dm_requires_both_members() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let outsider = common::token_for(&state, "usr_outsider").await;

    server
        .post(&format!("/api/v1/workspaces/{}/dm", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "userId": "usr_outsider" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post(&format!("/api/v1/workspaces/{}/dm", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&outsider))
        .json(&json!({ "userId": ws.owner_id }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post(&format!("/api/v1/workspaces/{}/dm", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dm_is_listed_to_participants_and_cannot_be_renamed() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let ws = common::seed_workspace(&state).await;
    let (friend_id, _friend_token) = common::add_member(&state, &ws.workspace_id).await;
    let (_bystander_id, bystander_token) = common::add_member(&state, &ws.workspace_id).await;

    let resp = server
        .post(&format!("/api/v1/workspaces/{}/dm", ws.workspace_id))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "userId": friend_id }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let dm: Value = resp.json();
    let dm_id = dm["id"].as_str().unwrap();

    let owner_sees = listed_channel_ids(&server, &ws.workspace_id, &ws.owner_token).await;
    assert!(owner_sees.iter().any(|id| id == dm_id));
    let bystander_sees = listed_channel_ids(&server, &ws.workspace_id, &bystander_token).await;
    assert!(!bystander_sees.iter().any(|id| id == dm_id));
    assert!(bystander_sees.contains(&ws.general_id));

    server
        .patch(&format!("/api/v1/channels/{dm_id}"))
        .add_header(AUTHORIZATION, common::bearer(&ws.owner_token))
        .json(&json!({ "name": "renamed" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}
