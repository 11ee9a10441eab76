//! Infrastructure layer: HTTP transport and REST client.

pub mod rest_client;
pub mod transport;

pub use rest_client::RestPolicyClient;
pub use transport::{HttpTransport, RequestOptions, Transport, TransportResponse};
