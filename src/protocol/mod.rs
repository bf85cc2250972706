//! Postgres wire protocol frames
//!
//! Only the frames needed to establish a session are given structure; every
//! other backend frame is carried opaquely as [`BackendMessage::Other`].

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use decode::decode_message;
pub use encode::encode_message;
pub use message::{AuthenticationMessage, BackendMessage, ErrorFields, FrontendMessage};
