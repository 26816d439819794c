//! Authentication primitives
//!
//! - `password`: Argon2id hashing and verification
//! - `session`: session cookie encoding and settings
//! - `flash`: one-shot messages carried across redirects

pub mod flash;
pub mod password;
pub mod session;

pub use flash::{Flash, FlashLevel, Flashes, GENERIC_ERROR};
pub use password::PasswordError;
pub use session::{SessionConfig, SetCookie};
