//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Uses JOINs for list operations (no N+1)
//! - Handles conflicts via ON CONFLICT (no check-then-insert)
//! - Uses transactions for multi-step writes

pub mod users;
pub mod chats;
pub mod messages;
pub mod sessions;

pub use users::{UserRepo, User, UserSummary, DbError};
pub use chats::{ChatRepo, ChatSummary, DmChat};
pub use messages::{MessageRepo, Message, ChatMessage};
pub use sessions::{SessionRepo, SessionUser};
