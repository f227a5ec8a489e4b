//! Likes and comments.
//!
//! Covers optimistic counter responses, background recount convergence,
//! duplicate-like rejection, and comment permissions.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Poll a counter column until it reaches the expected value. Recounts run
/// detached, so the response returns before the column converges.
async fn wait_for_count(pool: &sqlx::PgPool, sql: &str, id: Uuid, expected: i64) {
    for _ in 0..100 {
        let count: i64 = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_one(pool)
            .await
            .expect("count query failed");
        if count == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("counter did not converge to {}", expected);
}

// ===========================================================================
// Post likes
// ===========================================================================

#[tokio::test]
async fn like_post_returns_optimistic_count_and_converges() {
    let app = app().await;
    let author = app.create_user("like_author").await;
    let liker = app.create_user("like_liker").await;
    let post_id = app.create_post_for_user(author.id, "like me").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/like", post_id),
            json!({}),
            Some(&liker.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["likesCount"].as_i64().unwrap(), 1);

    wait_for_count(
        app.pool(),
        "SELECT likes_count FROM posts WHERE id = $1",
        post_id,
        1,
    )
    .await;
}

#[tokio::test]
async fn duplicate_like_is_rejected_without_side_effects() {
    let app = app().await;
    let author = app.create_user("dup_author").await;
    let liker = app.create_user("dup_liker").await;
    let post_id = app.create_post_for_user(author.id, "only once").await;

    let first = app
        .post_json(
            &format!("/posts/{}/like", post_id),
            json!({}),
            Some(&liker.access_token),
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let second = app
        .post_json(
            &format!("/posts/{}/like", post_id),
            json!({}),
            Some(&liker.access_token),
        )
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.error_message(), "post already liked");

    let like_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(liker.id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(like_rows, 1);

    let notification_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE recipient_id = $1 AND kind = 'liked_post' AND post_id = $2",
    )
    .bind(author.id)
    .bind(post_id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(notification_rows, 1);
}

#[tokio::test]
async fn unlike_without_like_is_not_found() {
    let app = app().await;
    let author = app.create_user("unlike_author").await;
    let stranger = app.create_user("unlike_stranger").await;
    let post_id = app.create_post_for_user(author.id, "never liked").await;

    let resp = app
        .delete(
            &format!("/posts/{}/like", post_id),
            Some(&stranger.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "like not found");
}

#[tokio::test]
async fn unlike_converges_counter_back_to_zero() {
    let app = app().await;
    let author = app.create_user("unlike2_author").await;
    let liker = app.create_user("unlike2_liker").await;
    let post_id = app.create_post_for_user(author.id, "like and unlike").await;

    app.post_json(
        &format!("/posts/{}/like", post_id),
        json!({}),
        Some(&liker.access_token),
    )
    .await;

    let resp = app
        .delete(
            &format!("/posts/{}/like", post_id),
            Some(&liker.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["likesCount"].as_i64().unwrap(), 0);

    wait_for_count(
        app.pool(),
        "SELECT likes_count FROM posts WHERE id = $1",
        post_id,
        0,
    )
    .await;
}

#[tokio::test]
async fn interleaved_likes_and_unlikes_converge_to_live_row_count() {
    let app = app().await;
    let author = app.create_user("mix_author").await;
    let first = app.create_user("mix_liker1").await;
    let second = app.create_user("mix_liker2").await;
    let third = app.create_user("mix_liker3").await;
    let post_id = app.create_post_for_user(author.id, "busy post").await;

    // first likes, second likes, first unlikes, third likes, second unlikes,
    // second likes again. Net: second and third hold likes.
    let actions = [
        (&first, true),
        (&second, true),
        (&first, false),
        (&third, true),
        (&second, false),
        (&second, true),
    ];
    for (user, like) in actions {
        let resp = if like {
            app.post_json(
                &format!("/posts/{}/like", post_id),
                json!({}),
                Some(&user.access_token),
            )
            .await
        } else {
            app.delete(
                &format!("/posts/{}/like", post_id),
                Some(&user.access_token),
            )
            .await
        };
        assert_eq!(resp.status, StatusCode::OK);
    }

    let live_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(live_rows, 2);

    wait_for_count(
        app.pool(),
        "SELECT likes_count FROM posts WHERE id = $1",
        post_id,
        live_rows,
    )
    .await;
}

#[tokio::test]
async fn like_nonexistent_post() {
    let app = app().await;
    let user = app.create_user("like_nopost").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/like", Uuid::new_v4()),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");
}

#[tokio::test]
async fn list_post_likes_shows_likers() {
    let app = app().await;
    let author = app.create_user("likers_author").await;
    let liker = app.create_user("likers_liker").await;
    let post_id = app.create_post_for_user(author.id, "popular").await;

    app.post_json(
        &format!("/posts/{}/like", post_id),
        json!({}),
        Some(&liker.access_token),
    )
    .await;

    let resp = app.get(&format!("/posts/{}/likes", post_id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"].as_str().unwrap(), liker.id.to_string());
    assert_eq!(body["count"].as_i64().unwrap(), 1);
}

// ===========================================================================
// Comments
// ===========================================================================

#[tokio::test]
async fn create_comment_and_converge_comments_count() {
    let app = app().await;
    let author = app.create_user("comment_author").await;
    let commenter = app.create_user("comment_commenter").await;
    let post_id = app.create_post_for_user(author.id, "discuss").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": "great post" }),
            Some(&commenter.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["body"].as_str().unwrap(), "great post");
    assert_eq!(
        body["authorUsername"].as_str().unwrap(),
        commenter.username
    );
    assert!(!body["isViewerLiked"].as_bool().unwrap());

    wait_for_count(
        app.pool(),
        "SELECT comments_count FROM posts WHERE id = $1",
        post_id,
        1,
    )
    .await;
}

#[tokio::test]
async fn comment_body_too_long() {
    let app = app().await;
    let user = app.create_user("comment_long").await;
    let post_id = app.create_post_for_user(user.id, "short replies only").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "body": "a".repeat(2001) }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.error_message(),
        "comment must be at most 2000 characters"
    );
}

#[tokio::test]
async fn comment_author_can_delete_own_comment() {
    let app = app().await;
    let author = app.create_user("cdel_author").await;
    let commenter = app.create_user("cdel_commenter").await;
    let post_id = app.create_post_for_user(author.id, "post").await;
    let comment_id = app
        .create_comment_for_user(post_id, commenter.id, "mine")
        .await;

    let resp = app
        .delete(
            &format!("/comments/{}", comment_id),
            Some(&commenter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn post_author_can_delete_any_comment_on_their_post() {
    let app = app().await;
    let author = app.create_user("cdel2_author").await;
    let commenter = app.create_user("cdel2_commenter").await;
    let post_id = app.create_post_for_user(author.id, "moderated").await;
    let comment_id = app
        .create_comment_for_user(post_id, commenter.id, "rude")
        .await;

    let resp = app
        .delete(
            &format!("/comments/{}", comment_id),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unrelated_user_cannot_delete_comment() {
    let app = app().await;
    let author = app.create_user("cdel3_author").await;
    let commenter = app.create_user("cdel3_commenter").await;
    let stranger = app.create_user("cdel3_stranger").await;
    let post_id = app.create_post_for_user(author.id, "post").await;
    let comment_id = app
        .create_comment_for_user(post_id, commenter.id, "comment")
        .await;

    let resp = app
        .delete(
            &format!("/comments/{}", comment_id),
            Some(&stranger.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn comment_likes_flow() {
    let app = app().await;
    let author = app.create_user("clike_author").await;
    let liker = app.create_user("clike_liker").await;
    let post_id = app.create_post_for_user(author.id, "post").await;
    let comment_id = app
        .create_comment_for_user(post_id, author.id, "self comment")
        .await;

    let resp = app
        .post_json(
            &format!("/comments/{}/like", comment_id),
            json!({}),
            Some(&liker.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["likesCount"].as_i64().unwrap(), 1);

    wait_for_count(
        app.pool(),
        "SELECT likes_count FROM comments WHERE id = $1",
        comment_id,
        1,
    )
    .await;

    // Viewer-relative flag shows up in the comment listing.
    let resp = app
        .get(
            &format!("/posts/{}/comments", post_id),
            Some(&liker.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json()["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert!(items[0]["isViewerLiked"].as_bool().unwrap());
}
