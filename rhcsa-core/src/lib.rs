pub mod builtin;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod probes;
pub mod sandbox;
pub mod scoring;
pub mod task;
pub mod validation;
