//! services/api/src/lib.rs
//!
//! HTTP service around the attendance ledger: configuration, the Postgres
//! adapter and the axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
