//! # Scribe Core
//!
//! The domain layer of the Scribe blog.
//! Entities, pagination, ports, and the feed/follow/authoring services live here.
//! This crate performs no I/O of its own; every side effect goes through a port.

pub mod domain;
pub mod error;
pub mod pagination;
pub mod ports;
pub mod services;

pub use error::{DomainError, RepoError};
pub use pagination::{Page, PageRequest};
