pub mod chain;
pub mod config;
pub mod contracts;
pub mod events;
pub mod execution;
pub mod metrics;
pub mod orchestrator;
pub mod pricing;
