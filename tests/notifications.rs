//! Notification lifecycle.
//!
//! Covers self-suppression, dispatch/retract symmetry, listing, and read
//! state transitions.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

async fn notification_rows(pool: &sqlx::PgPool, recipient_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
        .bind(recipient_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn liking_own_post_creates_no_notification() {
    let app = app().await;
    let user = app.create_user("selfnotif").await;
    let post_id = app.create_post_for_user(user.id, "my own post").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/like", post_id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    assert_eq!(notification_rows(app.pool(), user.id).await, 0);
}

#[tokio::test]
async fn commenting_own_post_creates_no_notification() {
    let app = app().await;
    let user = app.create_user("selfcomment").await;
    let post_id = app.create_post_for_user(user.id, "talking to myself").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": "first!" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    assert_eq!(notification_rows(app.pool(), user.id).await, 0);
}

#[tokio::test]
async fn like_then_unlike_leaves_no_notification() {
    let app = app().await;
    let author = app.create_user("retract_author").await;
    let liker = app.create_user("retract_liker").await;
    let post_id = app.create_post_for_user(author.id, "ephemeral like").await;

    app.post_json(
        &format!("/posts/{}/like", post_id),
        json!({}),
        Some(&liker.access_token),
    )
    .await;
    assert_eq!(notification_rows(app.pool(), author.id).await, 1);

    app.delete(
        &format!("/posts/{}/like", post_id),
        Some(&liker.access_token),
    )
    .await;
    assert_eq!(notification_rows(app.pool(), author.id).await, 0);
}

#[tokio::test]
async fn deleting_comment_retracts_its_notification() {
    let app = app().await;
    let author = app.create_user("cretract_author").await;
    let commenter = app.create_user("cretract_commenter").await;
    let post_id = app.create_post_for_user(author.id, "post").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": "soon deleted" }),
            Some(&commenter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let comment_id = resp.json()["id"].as_str().unwrap().to_string();
    assert_eq!(notification_rows(app.pool(), author.id).await, 1);

    let resp = app
        .delete(
            &format!("/comments/{}", comment_id),
            Some(&commenter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(notification_rows(app.pool(), author.id).await, 0);
}

#[tokio::test]
async fn list_notifications_includes_initiator_and_read_state() {
    let app = app().await;
    let author = app.create_user("nlist_author").await;
    let liker = app.create_user("nlist_liker").await;
    let post_id = app.create_post_for_user(author.id, "post").await;

    app.post_json(
        &format!("/posts/{}/like", post_id),
        json!({}),
        Some(&liker.access_token),
    )
    .await;

    let resp = app.get("/notifications", Some(&author.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"].as_str().unwrap(), "liked_post");
    assert_eq!(
        items[0]["initiatorUsername"].as_str().unwrap(),
        liker.username
    );
    assert_eq!(items[0]["postId"].as_str().unwrap(), post_id.to_string());
    assert!(!items[0]["isRead"].as_bool().unwrap());
    assert!(items[0]["readAt"].is_null());
}

#[tokio::test]
async fn mark_read_and_unread_count() {
    let app = app().await;
    let author = app.create_user("nread_author").await;
    let liker = app.create_user("nread_liker").await;
    let post_id = app.create_post_for_user(author.id, "post").await;

    app.post_json(
        &format!("/posts/{}/like", post_id),
        json!({}),
        Some(&liker.access_token),
    )
    .await;

    let resp = app
        .get("/notifications/unread-count", Some(&author.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unreadCount"].as_i64().unwrap(), 1);

    let list = app.get("/notifications", Some(&author.access_token)).await;
    let notification_id = list.json()["items"][0]["id"].as_str().unwrap().to_string();

    let resp = app
        .post_empty(
            &format!("/notifications/{}/read", notification_id),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .get("/notifications/unread-count", Some(&author.access_token))
        .await;
    assert_eq!(resp.json()["unreadCount"].as_i64().unwrap(), 0);

    let list = app.get("/notifications", Some(&author.access_token)).await;
    assert!(list.json()["items"][0]["isRead"].as_bool().unwrap());
}

#[tokio::test]
async fn cannot_mark_another_users_notification() {
    let app = app().await;
    let author = app.create_user("nforeign_author").await;
    let liker = app.create_user("nforeign_liker").await;
    let post_id = app.create_post_for_user(author.id, "post").await;

    app.post_json(
        &format!("/posts/{}/like", post_id),
        json!({}),
        Some(&liker.access_token),
    )
    .await;

    let list = app.get("/notifications", Some(&author.access_token)).await;
    let notification_id = list.json()["items"][0]["id"].as_str().unwrap().to_string();

    let resp = app
        .post_empty(
            &format!("/notifications/{}/read", notification_id),
            Some(&liker.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn read_all_clears_unread() {
    let app = app().await;
    let author = app.create_user("nreadall_author").await;
    let liker = app.create_user("nreadall_liker").await;
    let commenter = app.create_user("nreadall_commenter").await;
    let post_id = app.create_post_for_user(author.id, "busy post").await;

    app.post_json(
        &format!("/posts/{}/like", post_id),
        json!({}),
        Some(&liker.access_token),
    )
    .await;
    app.post_json(
        &format!("/posts/{}/comments", post_id),
        json!({ "body": "nice" }),
        Some(&commenter.access_token),
    )
    .await;

    let resp = app
        .get("/notifications/unread-count", Some(&author.access_token))
        .await;
    assert_eq!(resp.json()["unreadCount"].as_i64().unwrap(), 2);

    let resp = app
        .post_empty("/notifications/read-all", Some(&author.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .get("/notifications/unread-count", Some(&author.access_token))
        .await;
    assert_eq!(resp.json()["unreadCount"].as_i64().unwrap(), 0);
}
