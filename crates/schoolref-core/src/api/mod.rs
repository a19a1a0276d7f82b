//! Transport layer for the reference-data list endpoints.
//!
//! The cache only depends on the `Transport` trait; `ApiClient` is the
//! HTTP implementation used by the host application and the CLI. Tests
//! substitute scripted transports.

pub mod client;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use transport::{fetch_all_pages, PageEnvelope, PageRequest, ParentFilter, Transport};
