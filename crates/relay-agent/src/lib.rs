pub mod conversation;
pub mod openai;
pub mod persona;
pub mod pipeline;
pub mod provider;
pub mod session;

pub use conversation::Conversation;
pub use session::Session;
