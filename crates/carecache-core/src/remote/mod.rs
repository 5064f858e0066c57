//! Remote document store module.
//!
//! This module defines the `DocumentStore` port the cache wraps, the
//! `Query` model used for filtered reads, and `HttpDocumentStore`, a
//! client for the school's JSON REST document API.
//!
//! Requests use bearer token authentication; obtaining the token is the
//! caller's business.

pub mod error;
pub mod http;
pub mod query;
pub mod store;

pub use error::RemoteError;
pub use http::HttpDocumentStore;
pub use query::{Direction, Filter, FilterOp, Query};
pub use store::{Document, DocumentStore};
