//! Typed API client, error taxonomy, rate-limit parsing and domain services.

pub mod client;
pub mod domains;
pub mod errors;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use client::{ApiClient, ClientError, JwtProvider, RequestOptions};
pub use domains::DomainServices;
pub use errors::{to_api_error, try_parse_error_envelope, ApiError, ErrorEnvelope};
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
