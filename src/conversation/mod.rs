pub mod session;
pub mod store;

pub use session::{ ChatSession, ReplyDelay, SessionEvent };
pub use store::{ ConversationStore, UnreadCounter };
