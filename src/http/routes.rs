use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
}

pub fn account() -> Router<AppState> {
    Router::new()
        .route("/account/me", get(handlers::get_current_user))
        .route("/account", patch(handlers::update_profile))
        .route("/account", delete(handlers::delete_account))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(handlers::get_profile))
        .route("/users/:id/posts", get(handlers::list_user_posts))
        .route("/users/:id/followers", get(handlers::list_followers))
        .route("/users/:id/following", get(handlers::list_following))
        .route("/users/:id/follow", post(handlers::follow_user))
        .route("/users/:id/unfollow", post(handlers::unfollow_user))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id", get(handlers::get_post))
        .route("/posts/:id", patch(handlers::update_post))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/like", post(handlers::like_post))
        .route("/posts/:id/like", delete(handlers::unlike_post))
        .route("/posts/:id/likes", get(handlers::list_post_likes))
        .route("/posts/:id/comments", post(handlers::create_comment))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
        .route("/comments/:id", delete(handlers::delete_comment))
        .route("/comments/:id/like", post(handlers::like_comment))
        .route("/comments/:id/like", delete(handlers::unlike_comment))
}

pub fn feed() -> Router<AppState> {
    Router::new().route("/feed", get(handlers::feed))
}

pub fn conversations() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(handlers::open_conversation))
        .route("/conversations", get(handlers::list_conversations))
        .route(
            "/conversations/:id/messages",
            post(handlers::send_message),
        )
        .route(
            "/conversations/:id/messages",
            get(handlers::list_messages),
        )
        .route("/conversations/:id/seen", post(handlers::mark_seen))
        .route("/messages/:id/reactions", post(handlers::react_to_message))
        .route(
            "/messages/:id/reactions",
            delete(handlers::remove_message_reaction),
        )
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/unread-count",
            get(handlers::unread_notifications_count),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
}

pub fn media() -> Router<AppState> {
    Router::new()
        .route("/media", post(handlers::upload_media))
        .route("/media/:id", get(handlers::get_media))
        .route("/media/:id", delete(handlers::delete_media))
}
