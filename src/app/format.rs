use anyhow::Result;
use futures::future::try_join_all;
use uuid::Uuid;

use crate::domain::conversation::{Conversation, Message, Participant};
use crate::domain::engagement::Comment;
use crate::domain::post::Post;
use crate::domain::user::Profile;
use crate::infra::db::Db;

/// The requesting identity. Built from the optional auth extractor; an
/// anonymous viewer gets every viewer-relative flag hardcoded false.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewer {
    pub user_id: Option<Uuid>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

/// Viewer-relative lookups. Implemented for `Db` in production; tests use
/// call-counting doubles to assert the unauthenticated short-circuit.
#[allow(async_fn_in_trait)]
pub trait ViewerStore {
    async fn post_liked_by(&self, user_id: Uuid, post_id: Uuid) -> Result<bool>;
    async fn comment_liked_by(&self, user_id: Uuid, comment_id: Uuid) -> Result<bool>;
    async fn follows(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool>;
    async fn unread_messages_from(&self, conversation_id: Uuid, sender_id: Uuid) -> Result<i64>;
}

impl ViewerStore for Db {
    async fn post_liked_by(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM post_likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    async fn comment_liked_by(&self, user_id: Uuid, comment_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM comment_likes WHERE user_id = $1 AND comment_id = $2)",
        )
        .bind(user_id)
        .bind(comment_id)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    async fn follows(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    async fn unread_messages_from(&self, conversation_id: Uuid, sender_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id = $1 AND sender_id = $2 \
               AND seen_at IS NULL AND deleted_at IS NULL",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }
}

pub async fn annotate_post<S: ViewerStore>(
    store: &S,
    post: &mut Post,
    viewer: &Viewer,
) -> Result<()> {
    // No lookup for anonymous viewers: the flag is false by definition and a
    // query keyed on a null user id must never be issued.
    let Some(user_id) = viewer.user_id else {
        post.is_viewer_liked = false;
        return Ok(());
    };
    post.is_viewer_liked = store.post_liked_by(user_id, post.id).await?;
    Ok(())
}

pub async fn annotate_posts<S: ViewerStore>(
    store: &S,
    posts: &mut [Post],
    viewer: &Viewer,
) -> Result<()> {
    let Some(user_id) = viewer.user_id else {
        for post in posts.iter_mut() {
            post.is_viewer_liked = false;
        }
        return Ok(());
    };
    let flags = try_join_all(
        posts
            .iter()
            .map(|post| store.post_liked_by(user_id, post.id)),
    )
    .await?;
    for (post, liked) in posts.iter_mut().zip(flags) {
        post.is_viewer_liked = liked;
    }
    Ok(())
}

pub async fn annotate_comments<S: ViewerStore>(
    store: &S,
    comments: &mut [Comment],
    viewer: &Viewer,
) -> Result<()> {
    let Some(user_id) = viewer.user_id else {
        for comment in comments.iter_mut() {
            comment.is_viewer_liked = false;
        }
        return Ok(());
    };
    let flags = try_join_all(
        comments
            .iter()
            .map(|comment| store.comment_liked_by(user_id, comment.id)),
    )
    .await?;
    for (comment, liked) in comments.iter_mut().zip(flags) {
        comment.is_viewer_liked = liked;
    }
    Ok(())
}

pub async fn annotate_profile<S: ViewerStore>(
    store: &S,
    profile: &mut Profile,
    viewer: &Viewer,
) -> Result<()> {
    let Some(user_id) = viewer.user_id else {
        profile.is_viewer_follow = false;
        return Ok(());
    };
    if user_id == profile.id {
        profile.is_viewer_follow = false;
        return Ok(());
    }
    profile.is_viewer_follow = store.follows(user_id, profile.id).await?;
    Ok(())
}

pub async fn annotate_profiles<S: ViewerStore>(
    store: &S,
    profiles: &mut [Profile],
    viewer: &Viewer,
) -> Result<()> {
    for profile in profiles.iter_mut() {
        annotate_profile(store, profile, viewer).await?;
    }
    Ok(())
}

/// Resolves `participant` (the other user) and the unread count of messages
/// that user has sent, relative to the viewer.
pub async fn annotate_conversation<S: ViewerStore>(
    store: &S,
    conversation: &mut Conversation,
    viewer: &Viewer,
) -> Result<()> {
    let Some(user_id) = viewer.user_id else {
        conversation.participant = None;
        conversation.unread_messages_count = 0;
        return Ok(());
    };
    let other = if conversation.first.id == user_id {
        conversation.second.clone()
    } else if conversation.second.id == user_id {
        conversation.first.clone()
    } else {
        conversation.participant = None;
        conversation.unread_messages_count = 0;
        return Ok(());
    };
    conversation.unread_messages_count = store
        .unread_messages_from(conversation.id, other.id)
        .await?;
    conversation.participant = Some(other);

    if let Some(last_message) = conversation.last_message.as_mut() {
        annotate_message(last_message, &conversation.first, &conversation.second, viewer);
    }
    Ok(())
}

pub async fn annotate_conversations<S: ViewerStore>(
    store: &S,
    conversations: &mut [Conversation],
    viewer: &Viewer,
) -> Result<()> {
    for conversation in conversations.iter_mut() {
        annotate_conversation(store, conversation, viewer).await?;
    }
    Ok(())
}

/// Pure: the sender identity is on the row and the conversation's participant
/// pair is already loaded. `recipient` is the participant the message was
/// addressed to, i.e. whichever of the pair is not the sender.
pub fn annotate_message(
    message: &mut Message,
    first: &Participant,
    second: &Participant,
    viewer: &Viewer,
) {
    message.is_me_sender = viewer.user_id == Some(message.sender_id);
    let recipient = if message.sender_id == first.id {
        second
    } else {
        first
    };
    message.recipient = Some(recipient.clone());
}

pub fn annotate_messages(
    messages: &mut [Message],
    first: &Participant,
    second: &Participant,
    viewer: &Viewer,
) {
    for message in messages.iter_mut() {
        annotate_message(message, first, second, viewer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    struct CountingStore {
        liked: bool,
        follows: bool,
        unread_by_sender: HashMap<Uuid, i64>,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                liked: true,
                follows: true,
                unread_by_sender: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ViewerStore for CountingStore {
        async fn post_liked_by(&self, _user_id: Uuid, _post_id: Uuid) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.liked)
        }

        async fn comment_liked_by(&self, _user_id: Uuid, _comment_id: Uuid) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.liked)
        }

        async fn follows(&self, _follower_id: Uuid, _followee_id: Uuid) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.follows)
        }

        async fn unread_messages_from(
            &self,
            _conversation_id: Uuid,
            sender_id: Uuid,
        ) -> Result<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.unread_by_sender.get(&sender_id).copied().unwrap_or(0))
        }
    }

    fn test_post() -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author_username: "ada".into(),
            author_full_name: "Ada Lovelace".into(),
            author_avatar_url: None,
            body: "hello".into(),
            media_id: None,
            image_url: None,
            likes_count: 0,
            comments_count: 0,
            is_viewer_liked: false,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn participant(id: Uuid, username: &str) -> Participant {
        Participant {
            id,
            username: username.into(),
            full_name: username.into(),
            avatar_url: None,
        }
    }

    fn test_conversation(a: Uuid, b: Uuid) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            first: participant(a, "a"),
            second: participant(b, "b"),
            participant: None,
            unread_messages_count: 0,
            last_message: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn anonymous_post_annotation_issues_no_lookup() {
        let store = CountingStore::new();
        let mut post = test_post();
        post.is_viewer_liked = true; // must be reset, not queried

        annotate_post(&store, &mut post, &Viewer::anonymous())
            .await
            .unwrap();

        assert!(!post.is_viewer_liked);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn authenticated_post_annotation_queries_once() {
        let store = CountingStore::new();
        let mut post = test_post();

        annotate_post(&store, &mut post, &Viewer::user(Uuid::new_v4()))
            .await
            .unwrap();

        assert!(post.is_viewer_liked);
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn anonymous_list_annotation_issues_no_lookup() {
        let store = CountingStore::new();
        let mut posts = vec![test_post(), test_post(), test_post()];

        annotate_posts(&store, &mut posts, &Viewer::anonymous())
            .await
            .unwrap();

        assert!(posts.iter().all(|post| !post.is_viewer_liked));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn profile_of_self_is_never_followed() {
        let store = CountingStore::new();
        let viewer_id = Uuid::new_v4();
        let mut profile = Profile {
            id: viewer_id,
            username: "ada".into(),
            full_name: "Ada Lovelace".into(),
            bio: None,
            avatar_url: None,
            cover_url: None,
            created_at: OffsetDateTime::now_utc(),
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            is_viewer_follow: false,
        };

        annotate_profile(&store, &mut profile, &Viewer::user(viewer_id))
            .await
            .unwrap();

        assert!(!profile.is_viewer_follow);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn conversation_unread_count_is_viewer_relative() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut store = CountingStore::new();
        // 3 unseen messages from B, 2 unseen from A.
        store.unread_by_sender.insert(b, 3);
        store.unread_by_sender.insert(a, 2);

        let mut conversation = test_conversation(a, b);
        annotate_conversation(&store, &mut conversation, &Viewer::user(a))
            .await
            .unwrap();
        assert_eq!(conversation.unread_messages_count, 3);
        assert_eq!(conversation.participant.as_ref().unwrap().id, b);

        let mut conversation = test_conversation(a, b);
        annotate_conversation(&store, &mut conversation, &Viewer::user(b))
            .await
            .unwrap();
        assert_eq!(conversation.unread_messages_count, 2);
        assert_eq!(conversation.participant.as_ref().unwrap().id, a);
    }

    fn test_message(conversation_id: Uuid, sender_id: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            body: Some("hi".into()),
            image_url: None,
            seen_at: None,
            reactions: vec![],
            is_me_sender: false,
            recipient: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn message_sender_flag_relative_to_viewer() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (first, second) = (participant(a, "a"), participant(b, "b"));
        let mut message = test_message(Uuid::new_v4(), a);

        annotate_message(&mut message, &first, &second, &Viewer::user(a));
        assert!(message.is_me_sender);

        annotate_message(&mut message, &first, &second, &Viewer::user(Uuid::new_v4()));
        assert!(!message.is_me_sender);

        annotate_message(&mut message, &first, &second, &Viewer::anonymous());
        assert!(!message.is_me_sender);
    }

    #[test]
    fn message_recipient_is_the_non_sender_for_either_viewer() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (first, second) = (participant(a, "a"), participant(b, "b"));

        // A sent it, so B received it, whoever is looking.
        let mut message = test_message(Uuid::new_v4(), a);
        annotate_message(&mut message, &first, &second, &Viewer::user(a));
        assert_eq!(message.recipient.as_ref().unwrap().id, b);

        annotate_message(&mut message, &first, &second, &Viewer::user(b));
        assert_eq!(message.recipient.as_ref().unwrap().id, b);

        // And symmetrically for a message from B.
        let mut message = test_message(Uuid::new_v4(), b);
        annotate_message(&mut message, &first, &second, &Viewer::user(a));
        assert_eq!(message.recipient.as_ref().unwrap().id, a);

        annotate_message(&mut message, &first, &second, &Viewer::user(b));
        assert_eq!(message.recipient.as_ref().unwrap().id, a);
    }
}
