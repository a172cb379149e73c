//! # Scribe Shared
//!
//! Wire types of the blog: submitted forms with their validation rules, and the
//! JSON bodies the pages render to.

pub mod dto;
pub mod response;

pub use dto::FormErrors;
pub use response::ErrorResponse;
