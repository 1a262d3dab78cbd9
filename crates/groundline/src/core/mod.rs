//! Core configuration for the batching subsystem

pub mod config;

pub use config::BatchConfig;
