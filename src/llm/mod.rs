pub mod analyst;
pub mod chat;
pub mod client;
pub mod types;

pub use analyst::*;
pub use chat::*;
pub use client::*;
pub use types::*;
