//! # Atmosphere Library
//!
//! Control plane for a multi-cloud research platform: volume and snapshot
//! lifecycle, instance actions, account provisioning and machine requests.

pub mod accounts;
pub mod actions;
pub mod auth;
pub mod cloud;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod telemetry;
pub use migration;
