pub mod adapter;
pub mod commands;
pub mod error;
pub mod handler;
pub mod send;
pub mod target;

pub use adapter::DiscordAdapter;
pub use error::DiscordError;
pub use target::DiscordTarget;
