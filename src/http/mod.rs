//! HTTP layer - transport trait, reqwest client and test double
//!
//! Every remote call in the crate goes through the `Transport` trait so the
//! workflow can run against a scripted backend in tests.

pub mod mock;
pub mod rest;
pub mod transport;

pub use mock::MockTransport;
pub use rest::{RestClient, RestClientBuilder, backoff_delay};
pub use transport::{ApiRequest, ApiResponse, Method, Transport, json_list};
