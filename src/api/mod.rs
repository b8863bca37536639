//! Account API integration
//!
//! Split into the raw transport (authenticated requests, error mapping), the
//! endpoint map, and the typed client with cursor pagination.

pub mod client;
pub mod endpoints;
pub mod transport;

pub use client::WateriusApi;
pub use endpoints::Endpoints;
pub use transport::{ApiResponse, HttpTransport, Transport};
