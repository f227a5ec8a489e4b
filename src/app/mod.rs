pub mod auth;
pub mod conversations;
pub mod counts;
pub mod engagement;
pub mod format;
pub mod media;
pub mod notifications;
pub mod pagination;
pub mod posts;
pub mod social;
pub mod users;
