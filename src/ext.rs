//! Request-side extension points.
//!
//! [`Augmenter`] implementations decide where the account secret travels on the outgoing
//! request, and [`DestinationRequestExt`] carries the per-request destination snapshot and
//! deadline through `http::Request` extensions.

pub mod augmenter;
pub mod request;

pub use augmenter::*;
pub use request::*;
