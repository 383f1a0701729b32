//! QUORUM — Multi-Model Consensus Engine for Prediction Markets
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod prompt;
pub mod normalize;
pub mod providers;
pub mod weights;
pub mod engine;
pub mod storage;
pub mod api;
