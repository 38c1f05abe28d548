//! Operation surface for the warroom core: an axum HTTP + SSE gateway.
//!
//! Transport is deliberately thin — every handler acquires the room via
//! the manager and delegates to the core. Authentication is an external
//! collaborator: the gateway consumes the already-verified principal from
//! trusted headers and enforces the DM role on DM-only routes.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod state;
