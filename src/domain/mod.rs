pub mod conversation;
pub mod engagement;
pub mod media;
pub mod notification;
pub mod post;
pub mod user;
