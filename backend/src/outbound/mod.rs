//! Outbound adapters that issue requests to external services while keeping
//! transport details at the edge.

pub mod api;
