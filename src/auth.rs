//! Account identifiers, credential secrets, and destination auth status.

pub mod id;
pub mod secret;
pub mod status;

pub use id::*;
pub use secret::*;
pub use status::*;
