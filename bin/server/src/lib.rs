//! contrarian HTTP server.
//!
//! This crate wires the debate orchestrator to an axum router, a
//! configuration layer and a PostgreSQL conversation store.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
