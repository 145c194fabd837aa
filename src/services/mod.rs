// Service exports
pub mod delegate;
pub mod session_store;

pub use delegate::{ClaudeClient, DelegateError};
pub use session_store::{SessionKey, SessionStore, StoreError};
