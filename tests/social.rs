//! Follow graph.
//!
//! Covers follow/unfollow, duplicate and self follows, follower listings,
//! and the follow notification lifecycle.

mod common;

use axum::http::StatusCode;
use common::app;
use uuid::Uuid;

#[tokio::test]
async fn follow_and_unfollow() {
    let app = app().await;
    let alice = app.create_user("follow_alice").await;
    let bob = app.create_user("follow_bob").await;

    let resp = app
        .post_empty(
            &format!("/users/{}/follow", bob.id),
            Some(&alice.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND followee_id = $2",
    )
    .bind(alice.id)
    .bind(bob.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(rows, 1);

    let resp = app
        .post_empty(
            &format!("/users/{}/unfollow", bob.id),
            Some(&alice.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND followee_id = $2",
    )
    .bind(alice.id)
    .bind(bob.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn duplicate_follow_conflicts() {
    let app = app().await;
    let alice = app.create_user("dupfollow_alice").await;
    let bob = app.create_user("dupfollow_bob").await;

    let first = app
        .post_empty(
            &format!("/users/{}/follow", bob.id),
            Some(&alice.access_token),
        )
        .await;
    assert_eq!(first.status, StatusCode::NO_CONTENT);

    let second = app
        .post_empty(
            &format!("/users/{}/follow", bob.id),
            Some(&alice.access_token),
        )
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.error_message(), "already following");
}

#[tokio::test]
async fn self_follow_is_rejected() {
    let app = app().await;
    let user = app.create_user("selffollow").await;

    let resp = app
        .post_empty(
            &format!("/users/{}/follow", user.id),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot follow yourself");
}

#[tokio::test]
async fn unfollow_when_not_following() {
    let app = app().await;
    let alice = app.create_user("nofollow_alice").await;
    let bob = app.create_user("nofollow_bob").await;

    let resp = app
        .post_empty(
            &format!("/users/{}/unfollow", bob.id),
            Some(&alice.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "not following");
}

#[tokio::test]
async fn follow_nonexistent_user() {
    let app = app().await;
    let user = app.create_user("follow_ghost").await;

    let resp = app
        .post_empty(
            &format!("/users/{}/follow", Uuid::new_v4()),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn followers_listing_paginates_and_annotates() {
    let app = app().await;
    let celebrity = app.create_user("followers_celebrity").await;
    let fan_a = app.create_user("followers_fan_a").await;
    let fan_b = app.create_user("followers_fan_b").await;

    for fan in [&fan_a, &fan_b] {
        let resp = app
            .post_empty(
                &format!("/users/{}/follow", celebrity.id),
                Some(&fan.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
    }

    let resp = app
        .get(
            &format!("/users/{}/followers?page=1&limit=10", celebrity.id),
            Some(&fan_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["count"].as_i64().unwrap(), 2);
    assert_eq!(body["currentPage"].as_i64().unwrap(), 1);
    assert!(body["nextPage"].is_null());
    assert!(body["prevPage"].is_null());
    assert_eq!(body["lastPage"].as_i64().unwrap(), 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    // fan_a does not follow the other fan, so every entry reads false for
    // this viewer (fan_a itself is in the list, which also reads false).
    for item in body["items"].as_array().unwrap() {
        assert!(!item["isViewerFollow"].as_bool().unwrap());
    }
}

#[tokio::test]
async fn following_listing_shows_viewer_follow_flag() {
    let app = app().await;
    let alice = app.create_user("following_alice").await;
    let bob = app.create_user("following_bob").await;
    let carol = app.create_user("following_carol").await;

    // Alice and Carol both follow Bob.
    for user in [&alice, &carol] {
        app.post_empty(
            &format!("/users/{}/follow", bob.id),
            Some(&user.access_token),
        )
        .await;
    }

    let resp = app
        .get(
            &format!("/users/{}/following", alice.id),
            Some(&carol.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json()["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"].as_str().unwrap(), bob.id.to_string());
    assert!(items[0]["isViewerFollow"].as_bool().unwrap());
}

#[tokio::test]
async fn follow_notification_is_dispatched_and_retracted() {
    let app = app().await;
    let alice = app.create_user("fnotif_alice").await;
    let bob = app.create_user("fnotif_bob").await;

    app.post_empty(
        &format!("/users/{}/follow", bob.id),
        Some(&alice.access_token),
    )
    .await;

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE recipient_id = $1 AND initiator_id = $2 AND kind = 'followed'",
    )
    .bind(bob.id)
    .bind(alice.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(rows, 1);

    app.post_empty(
        &format!("/users/{}/unfollow", bob.id),
        Some(&alice.access_token),
    )
    .await;

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE recipient_id = $1 AND initiator_id = $2 AND kind = 'followed'",
    )
    .bind(bob.id)
    .bind(alice.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(rows, 0);
}
