//! Domain models with validation at construction
//!
//! Form input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod username;
pub mod password;
pub mod message;
pub mod search;

pub use validation::ValidationError;
pub use username::Username;
pub use password::Password;
pub use message::MessageBody;
pub use search::SearchQuery;
