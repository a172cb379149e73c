//! Middleware modules.

pub mod auth;
pub mod csrf;
pub mod error;
