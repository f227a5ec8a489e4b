use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{AuthService, SignupResult};
use crate::app::conversations::{
    ConversationService, ListMessagesResult, OpenResult, ReactionResult, SeenResult,
    SendMessageResult,
};
use crate::app::engagement::{
    CommentCreateResult, CommentDeleteResult, EngagementService, LikeResult, UnlikeResult,
    MAX_COMMENT_LEN,
};
use crate::app::format::{self, Viewer};
use crate::app::media::{MediaDeleteResult, MediaService, UploadResult};
use crate::app::notifications::NotificationService;
use crate::app::pagination::Page;
use crate::app::posts::{
    PostCreateResult, PostDeleteResult, PostService, PostUpdateResult, MAX_POST_LEN,
};
use crate::app::social::{FollowResult, SocialService, UnfollowResult};
use crate::app::users::{ProfileUpdate, UserService};
use crate::domain::user::User;
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationQuery {
    fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (page, limit)
    }
}

fn viewer_of(auth: &Option<AuthUser>) -> Viewer {
    match auth {
        Some(auth) => Viewer::user(auth.user_id),
        None => Viewer::anonymous(),
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.push.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let username = payload.username.trim();
    let mut violations = Vec::new();
    if username.len() < 3 || username.len() > 30 {
        violations.push("username must be between 3 and 30 characters".to_string());
    }
    if !payload.email.contains('@') {
        violations.push("invalid email".to_string());
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        violations.push("first and last name are required".to_string());
    }
    if payload.password.len() < 8 {
        violations.push("password must be at least 8 characters".to_string());
    }
    if !violations.is_empty() {
        return Err(AppError::bad_request("validation failed").with_errors(violations));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    );
    let result = service
        .signup(
            username.to_string(),
            payload.email.trim().to_lowercase(),
            payload.first_name.trim().to_string(),
            payload.last_name.trim().to_string(),
            payload.password,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to sign up");
            AppError::internal("failed to sign up")
        })?;

    match result {
        SignupResult::Created(user) => Ok((StatusCode::CREATED, Json(user))),
        SignupResult::UsernameTaken => Err(AppError::conflict("username already taken")),
        SignupResult::EmailTaken => Err(AppError::conflict("email already registered")),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.identifier.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("identifier and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    );
    let tokens = service
        .login(&payload.identifier, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refreshToken is required"));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    );
    let tokens = service
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refreshToken is required"));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    );
    let revoked = service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    if revoked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::unauthorized("invalid refresh token"))
    }
}

pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<User>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service.get_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load current user");
        AppError::internal("failed to load current user")
    })?;

    user.map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_media_id: Option<Uuid>,
    pub cover_media_id: Option<Uuid>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    if let Some(first_name) = &payload.first_name {
        if first_name.trim().is_empty() {
            return Err(AppError::bad_request("firstName cannot be empty"));
        }
    }
    if let Some(last_name) = &payload.last_name {
        if last_name.trim().is_empty() {
            return Err(AppError::bad_request("lastName cannot be empty"));
        }
    }

    for media_id in [payload.avatar_media_id, payload.cover_media_id]
        .into_iter()
        .flatten()
    {
        let media_service = MediaService::new(state.db.clone(), state.storage.clone());
        let media = media_service.get(media_id).await.map_err(|err| {
            tracing::error!(error = ?err, "failed to load media");
            AppError::internal("failed to update profile")
        })?;
        match media {
            Some(media) if media.owner_id == auth.user_id => {}
            _ => return Err(AppError::bad_request("media not found or not owned")),
        }
    }

    let service = UserService::new(state.db.clone());
    let user = service
        .update_profile(
            auth.user_id,
            ProfileUpdate {
                first_name: payload.first_name,
                last_name: payload.last_name,
                bio: payload.bio,
                avatar_media_id: payload.avatar_media_id,
                cover_media_id: payload.cover_media_id,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    user.map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    let service = UserService::new(state.db.clone());
    service.delete_account(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to delete account");
        AppError::internal("failed to delete account")
    })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<crate::domain::user::Profile>, AppError> {
    let service = UserService::new(state.db.clone());
    let profile = service.get_profile(user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load profile");
        AppError::internal("failed to load profile")
    })?;

    let mut profile = profile.ok_or_else(|| AppError::not_found("user not found"))?;
    format::annotate_profile(&state.db, &mut profile, &viewer_of(&auth))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format profile");
            AppError::internal("failed to load profile")
        })?;
    Ok(Json(profile))
}

pub async fn list_user_posts(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::post::Post>>, AppError> {
    let (page, limit) = query.resolve();
    let service = PostService::new(state.db.clone());
    let listed = service
        .list_by_author(user_id, page, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list user posts");
            AppError::internal("failed to list posts")
        })?;

    let (mut posts, total) = listed.ok_or_else(|| AppError::not_found("user not found"))?;
    format::annotate_posts(&state.db, &mut posts, &viewer_of(&auth))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format posts");
            AppError::internal("failed to list posts")
        })?;
    Ok(Json(Page::new(posts, total, page, limit)))
}

pub async fn list_followers(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::user::Profile>>, AppError> {
    let (page, limit) = query.resolve();
    let service = SocialService::new(state.db.clone(), state.push.clone());
    let listed = service
        .list_followers(user_id, page, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list followers");
            AppError::internal("failed to list followers")
        })?;

    let (mut profiles, total) = listed.ok_or_else(|| AppError::not_found("user not found"))?;
    format::annotate_profiles(&state.db, &mut profiles, &viewer_of(&auth))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format profiles");
            AppError::internal("failed to list followers")
        })?;
    Ok(Json(Page::new(profiles, total, page, limit)))
}

pub async fn list_following(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::user::Profile>>, AppError> {
    let (page, limit) = query.resolve();
    let service = SocialService::new(state.db.clone(), state.push.clone());
    let listed = service
        .list_following(user_id, page, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list following");
            AppError::internal("failed to list following")
        })?;

    let (mut profiles, total) = listed.ok_or_else(|| AppError::not_found("user not found"))?;
    format::annotate_profiles(&state.db, &mut profiles, &viewer_of(&auth))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format profiles");
            AppError::internal("failed to list following")
        })?;
    Ok(Json(Page::new(profiles, total, page, limit)))
}

pub async fn follow_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if user_id == auth.user_id {
        return Err(AppError::bad_request("cannot follow yourself"));
    }

    let service = SocialService::new(state.db.clone(), state.push.clone());
    let result = service.follow(auth.user_id, user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to follow user");
        AppError::internal("failed to follow user")
    })?;

    match result {
        FollowResult::Followed => Ok(StatusCode::NO_CONTENT),
        FollowResult::AlreadyFollowing => Err(AppError::conflict("already following")),
        FollowResult::UserNotFound => Err(AppError::not_found("user not found")),
    }
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if user_id == auth.user_id {
        return Err(AppError::bad_request("cannot unfollow yourself"));
    }

    let service = SocialService::new(state.db.clone(), state.push.clone());
    let result = service
        .unfollow(auth.user_id, user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to unfollow user");
            AppError::internal("failed to unfollow user")
        })?;

    match result {
        UnfollowResult::Unfollowed => Ok(StatusCode::NO_CONTENT),
        UnfollowResult::NotFollowing => Err(AppError::not_found("not following")),
        UnfollowResult::UserNotFound => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub body: Option<String>,
    pub media_id: Option<Uuid>,
}

pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<crate::domain::post::Post>), AppError> {
    let body = payload.body.unwrap_or_default();
    if body.trim().is_empty() && payload.media_id.is_none() {
        return Err(AppError::bad_request("post needs a body or an image"));
    }
    if body.len() > MAX_POST_LEN {
        return Err(AppError::bad_request(format!(
            "post body must be at most {} characters",
            MAX_POST_LEN
        )));
    }

    let service = PostService::new(state.db.clone());
    let result = service
        .create(auth.user_id, body.trim(), payload.media_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    match result {
        PostCreateResult::Created(post) => Ok((StatusCode::CREATED, Json(post))),
        PostCreateResult::MediaNotOwned => {
            Err(AppError::bad_request("media not found or not owned"))
        }
    }
}

pub async fn get_post(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<crate::domain::post::Post>, AppError> {
    let service = PostService::new(state.db.clone());
    let post = service.get(post_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load post");
        AppError::internal("failed to load post")
    })?;

    let mut post = post.ok_or_else(|| AppError::not_found("post not found"))?;
    format::annotate_post(&state.db, &mut post, &viewer_of(&auth))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format post");
            AppError::internal("failed to load post")
        })?;
    Ok(Json(post))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub body: String,
}

pub async fn update_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<crate::domain::post::Post>, AppError> {
    if payload.body.trim().is_empty() {
        return Err(AppError::bad_request("body cannot be empty"));
    }
    if payload.body.len() > MAX_POST_LEN {
        return Err(AppError::bad_request(format!(
            "post body must be at most {} characters",
            MAX_POST_LEN
        )));
    }

    let service = PostService::new(state.db.clone());
    let result = service
        .update_body(auth.user_id, post_id, payload.body.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    match result {
        PostUpdateResult::Updated(mut post) => {
            format::annotate_post(&state.db, &mut post, &Viewer::user(auth.user_id))
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, "failed to format post");
                    AppError::internal("failed to update post")
                })?;
            Ok(Json(post))
        }
        PostUpdateResult::NotFound => Err(AppError::not_found("post not found")),
        PostUpdateResult::Forbidden => Err(AppError::forbidden("not the post author")),
    }
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    let result = service.delete(auth.user_id, post_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    match result {
        PostDeleteResult::Deleted => Ok(StatusCode::NO_CONTENT),
        PostDeleteResult::NotFound => Err(AppError::not_found("post not found")),
        PostDeleteResult::Forbidden => Err(AppError::forbidden("not the post author")),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikesCountResponse {
    pub likes_count: i64,
}

pub async fn like_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikesCountResponse>, AppError> {
    let service = EngagementService::new(state.db.clone(), state.push.clone());
    let result = service
        .like_post(auth.user_id, post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to like post");
            AppError::internal("failed to like post")
        })?;

    match result {
        LikeResult::Applied(likes_count) => Ok(Json(LikesCountResponse { likes_count })),
        LikeResult::Duplicate => Err(AppError::bad_request("post already liked")),
        LikeResult::TargetNotFound => Err(AppError::not_found("post not found")),
    }
}

pub async fn unlike_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikesCountResponse>, AppError> {
    let service = EngagementService::new(state.db.clone(), state.push.clone());
    let result = service
        .unlike_post(auth.user_id, post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to unlike post");
            AppError::internal("failed to unlike post")
        })?;

    match result {
        UnlikeResult::Applied(likes_count) => Ok(Json(LikesCountResponse { likes_count })),
        UnlikeResult::Missing => Err(AppError::not_found("like not found")),
        UnlikeResult::TargetNotFound => Err(AppError::not_found("post not found")),
    }
}

pub async fn list_post_likes(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::user::Profile>>, AppError> {
    let (page, limit) = query.resolve();
    let service = EngagementService::new(state.db.clone(), state.push.clone());
    let listed = service
        .list_post_likers(post_id, page, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list post likes");
            AppError::internal("failed to list likes")
        })?;

    let (mut profiles, total) = listed.ok_or_else(|| AppError::not_found("post not found"))?;
    format::annotate_profiles(&state.db, &mut profiles, &viewer_of(&auth))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format profiles");
            AppError::internal("failed to list likes")
        })?;
    Ok(Json(Page::new(profiles, total, page, limit)))
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<crate::domain::engagement::Comment>), AppError> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("comment body is required"));
    }
    if body.len() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request(format!(
            "comment must be at most {} characters",
            MAX_COMMENT_LEN
        )));
    }

    let service = EngagementService::new(state.db.clone(), state.push.clone());
    let result = service
        .create_comment(auth.user_id, post_id, body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create comment");
            AppError::internal("failed to create comment")
        })?;

    match result {
        CommentCreateResult::Created(comment) => Ok((StatusCode::CREATED, Json(comment))),
        CommentCreateResult::PostNotFound => Err(AppError::not_found("post not found")),
    }
}

pub async fn list_post_comments(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::engagement::Comment>>, AppError> {
    let (page, limit) = query.resolve();
    let service = EngagementService::new(state.db.clone(), state.push.clone());
    let listed = service
        .list_comments(post_id, page, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    let (mut comments, total) = listed.ok_or_else(|| AppError::not_found("post not found"))?;
    format::annotate_comments(&state.db, &mut comments, &viewer_of(&auth))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format comments");
            AppError::internal("failed to list comments")
        })?;
    Ok(Json(Page::new(comments, total, page, limit)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = EngagementService::new(state.db.clone(), state.push.clone());
    let result = service
        .delete_comment(auth.user_id, comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;

    match result {
        CommentDeleteResult::Deleted => Ok(StatusCode::NO_CONTENT),
        CommentDeleteResult::NotFound => Err(AppError::not_found("comment not found")),
        CommentDeleteResult::Forbidden => {
            Err(AppError::forbidden("not the comment or post author"))
        }
    }
}

pub async fn like_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<LikesCountResponse>, AppError> {
    let service = EngagementService::new(state.db.clone(), state.push.clone());
    let result = service
        .like_comment(auth.user_id, comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to like comment");
            AppError::internal("failed to like comment")
        })?;

    match result {
        LikeResult::Applied(likes_count) => Ok(Json(LikesCountResponse { likes_count })),
        LikeResult::Duplicate => Err(AppError::bad_request("comment already liked")),
        LikeResult::TargetNotFound => Err(AppError::not_found("comment not found")),
    }
}

pub async fn unlike_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<LikesCountResponse>, AppError> {
    let service = EngagementService::new(state.db.clone(), state.push.clone());
    let result = service
        .unlike_comment(auth.user_id, comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to unlike comment");
            AppError::internal("failed to unlike comment")
        })?;

    match result {
        UnlikeResult::Applied(likes_count) => Ok(Json(LikesCountResponse { likes_count })),
        UnlikeResult::Missing => Err(AppError::not_found("like not found")),
        UnlikeResult::TargetNotFound => Err(AppError::not_found("comment not found")),
    }
}

pub async fn feed(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::post::Post>>, AppError> {
    let (page, limit) = query.resolve();
    let service = PostService::new(state.db.clone());
    let (mut posts, total) = service.feed(page, limit).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load feed");
        AppError::internal("failed to load feed")
    })?;

    format::annotate_posts(&state.db, &mut posts, &viewer_of(&auth))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format feed");
            AppError::internal("failed to load feed")
        })?;
    Ok(Json(Page::new(posts, total, page, limit)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversationRequest {
    pub user_id: Uuid,
}

pub async fn open_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<OpenConversationRequest>,
) -> Result<Json<crate::domain::conversation::Conversation>, AppError> {
    if payload.user_id == auth.user_id {
        return Err(AppError::bad_request("cannot message yourself"));
    }

    let service = ConversationService::new(state.db.clone(), state.push.clone());
    let result = service
        .open(auth.user_id, payload.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to open conversation");
            AppError::internal("failed to open conversation")
        })?;

    match result {
        OpenResult::Opened(mut conversation) => {
            format::annotate_conversation(
                &state.db,
                &mut conversation,
                &Viewer::user(auth.user_id),
            )
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to format conversation");
                AppError::internal("failed to open conversation")
            })?;
            Ok(Json(conversation))
        }
        OpenResult::UserNotFound => Err(AppError::not_found("user not found")),
    }
}

pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::conversation::Conversation>>, AppError> {
    let (page, limit) = query.resolve();
    let service = ConversationService::new(state.db.clone(), state.push.clone());
    let (mut conversations, total) =
        service.list(auth.user_id, page, limit).await.map_err(|err| {
            tracing::error!(error = ?err, "failed to list conversations");
            AppError::internal("failed to list conversations")
        })?;

    format::annotate_conversations(&state.db, &mut conversations, &Viewer::user(auth.user_id))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to format conversations");
            AppError::internal("failed to list conversations")
        })?;
    Ok(Json(Page::new(conversations, total, page, limit)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub body: Option<String>,
    pub media_id: Option<Uuid>,
}

pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<crate::domain::conversation::Message>), AppError> {
    let body = payload.body.map(|body| body.trim().to_string());
    let has_body = body.as_deref().is_some_and(|body| !body.is_empty());
    if !has_body && payload.media_id.is_none() {
        return Err(AppError::bad_request("message needs a body or an image"));
    }

    let service = ConversationService::new(state.db.clone(), state.push.clone());
    let result = service
        .send_message(
            auth.user_id,
            conversation_id,
            if has_body { body } else { None },
            payload.media_id,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to send message");
            AppError::internal("failed to send message")
        })?;

    match result {
        SendMessageResult::Sent {
            mut message,
            participants: (first, second),
        } => {
            format::annotate_message(&mut message, &first, &second, &Viewer::user(auth.user_id));
            Ok((StatusCode::CREATED, Json(message)))
        }
        SendMessageResult::ConversationNotFound => {
            Err(AppError::not_found("conversation not found"))
        }
        SendMessageResult::Forbidden => Err(AppError::forbidden("not a participant")),
        SendMessageResult::MediaNotOwned => {
            Err(AppError::bad_request("media not found or not owned"))
        }
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::conversation::Message>>, AppError> {
    let (page, limit) = query.resolve();
    let service = ConversationService::new(state.db.clone(), state.push.clone());
    let result = service
        .list_messages(auth.user_id, conversation_id, page, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list messages");
            AppError::internal("failed to list messages")
        })?;

    match result {
        ListMessagesResult::Listed {
            mut messages,
            participants: (first, second),
            total,
        } => {
            format::annotate_messages(&mut messages, &first, &second, &Viewer::user(auth.user_id));
            Ok(Json(Page::new(messages, total, page, limit)))
        }
        ListMessagesResult::ConversationNotFound => {
            Err(AppError::not_found("conversation not found"))
        }
        ListMessagesResult::Forbidden => Err(AppError::forbidden("not a participant")),
    }
}

pub async fn mark_seen(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = ConversationService::new(state.db.clone(), state.push.clone());
    let result = service
        .mark_seen(auth.user_id, conversation_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to mark messages seen");
            AppError::internal("failed to mark messages seen")
        })?;

    match result {
        SeenResult::Marked => Ok(StatusCode::NO_CONTENT),
        SeenResult::ConversationNotFound => Err(AppError::not_found("conversation not found")),
        SeenResult::Forbidden => Err(AppError::forbidden("not a participant")),
    }
}

#[derive(Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}

pub async fn react_to_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<ReactionRequest>,
) -> Result<StatusCode, AppError> {
    if payload.emoji.trim().is_empty() {
        return Err(AppError::bad_request("emoji is required"));
    }

    let service = ConversationService::new(state.db.clone(), state.push.clone());
    let result = service
        .react(auth.user_id, message_id, payload.emoji.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to react to message");
            AppError::internal("failed to react to message")
        })?;

    match result {
        ReactionResult::Applied | ReactionResult::Removed => Ok(StatusCode::NO_CONTENT),
        ReactionResult::MessageNotFound => Err(AppError::not_found("message not found")),
        ReactionResult::Forbidden => Err(AppError::forbidden("not a participant")),
    }
}

pub async fn remove_message_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = ConversationService::new(state.db.clone(), state.push.clone());
    let result = service
        .unreact(auth.user_id, message_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to remove reaction");
            AppError::internal("failed to remove reaction")
        })?;

    match result {
        ReactionResult::Applied | ReactionResult::Removed => Ok(StatusCode::NO_CONTENT),
        ReactionResult::MessageNotFound => Err(AppError::not_found("message not found")),
        ReactionResult::Forbidden => Err(AppError::forbidden("not a participant")),
    }
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<crate::domain::notification::Notification>>, AppError> {
    let (page, limit) = query.resolve();
    let service = NotificationService::new(state.db.clone(), state.push.clone());
    let (notifications, total) =
        service.list(auth.user_id, page, limit).await.map_err(|err| {
            tracing::error!(error = ?err, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;
    Ok(Json(Page::new(notifications, total, page, limit)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

pub async fn unread_notifications_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let service = NotificationService::new(state.db.clone(), state.push.clone());
    let unread_count = service.unread_count(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to count unread notifications");
        AppError::internal("failed to count unread notifications")
    })?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone(), state.push.clone());
    let marked = service
        .mark_read(auth.user_id, notification_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to mark notification read");
            AppError::internal("failed to mark notification read")
        })?;

    if marked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("notification not found"))
    }
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone(), state.push.clone());
    service.mark_all_read(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to mark notifications read");
        AppError::internal("failed to mark notifications read")
    })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_media(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<crate::domain::media::Media>), AppError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::bad_request("Content-Type header is required"))?
        .to_string();

    if body.is_empty() {
        return Err(AppError::bad_request("empty upload"));
    }
    if body.len() as i64 > state.upload_max_bytes {
        return Err(AppError::bad_request(format!(
            "upload exceeds {} bytes",
            state.upload_max_bytes
        )));
    }

    let service = MediaService::new(state.db.clone(), state.storage.clone());
    let result = service
        .upload(auth.user_id, &content_type, body.to_vec())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to upload media");
            AppError::internal("failed to upload media")
        })?;

    match result {
        UploadResult::Stored(media) => Ok((StatusCode::CREATED, Json(media))),
        UploadResult::UnsupportedType => Err(AppError::bad_request(
            "only image/jpeg, image/png and image/webp are supported",
        )),
        UploadResult::NotAnImage => Err(AppError::bad_request("payload is not a decodable image")),
    }
}

pub async fn get_media(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(media_id): Path<Uuid>,
) -> Result<Json<crate::domain::media::Media>, AppError> {
    let service = MediaService::new(state.db.clone(), state.storage.clone());
    let media = service.get(media_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load media");
        AppError::internal("failed to load media")
    })?;

    media
        .map(Json)
        .ok_or_else(|| AppError::not_found("media not found"))
}

pub async fn delete_media(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(media_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = MediaService::new(state.db.clone(), state.storage.clone());
    let result = service.delete(auth.user_id, media_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to delete media");
        AppError::internal("failed to delete media")
    })?;

    match result {
        MediaDeleteResult::Deleted => Ok(StatusCode::NO_CONTENT),
        MediaDeleteResult::NotFound => Err(AppError::not_found("media not found")),
        MediaDeleteResult::Forbidden => Err(AppError::forbidden("not the media owner")),
    }
}
