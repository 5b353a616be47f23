pub mod api;
pub mod broker;
pub mod config;
pub mod context;
pub mod health;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod service;
pub mod telemetry;
