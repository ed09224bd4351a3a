//! Core types, config, and errors for TrafficSense.
//!
//! Everything that crosses a crate boundary lives here: the [`event`] records
//! streamed to clients, the HTTP [`protocol`] bodies, the [`config`] model, and
//! the shared [`error`] taxonomy.

pub mod config;
pub mod error;
pub mod event;
pub mod protocol;
