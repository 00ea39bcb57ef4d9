//! taskhub library
//!
//! This module exports the core components for testing and integration.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod server;
pub mod services;
pub mod state;
pub mod types;
pub mod web;
