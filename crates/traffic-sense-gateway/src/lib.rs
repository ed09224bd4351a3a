//! HTTP gateway for the traffic agent.
//!
//! Serves streaming turns as newline-delimited JSON events, non-streaming
//! turns as a single JSON record, and conversation reset, all backed by one
//! shared [`AgentService`](traffic_sense_agent::AgentService).

#[cfg(feature = "metrics")]
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{router, start_gateway};
pub use state::GatewayState;
