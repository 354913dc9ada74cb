//! Core library for the `protodrill` CLI.
//!
//! This crate provides the building blocks used by the binary: CLI
//! argument types, exercise-file parsing, the execution orchestrator with
//! its worker pool and client runners, the write-once PKI store, and the
//! bridge listeners for external server-script sessions. The primary
//! user-facing interface is the `protodrill` command-line application.
pub mod args;
pub mod bridge;
pub mod config;
pub mod entry;
pub mod error;
pub mod heartbeat;
pub mod logger;
pub mod orchestrate;
pub mod pki;
pub mod pool;
pub mod runner;
pub mod script;
pub mod shutdown;
