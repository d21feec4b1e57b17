//! TaskGenius library
//!
//! Natural-language task entry, priority scoring, reminders and the HTTP API
//! that exposes them. This module exports the core components for testing and
//! integration.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod notify;
pub mod parser;
pub mod reminder;
pub mod scorer;
pub mod types;
