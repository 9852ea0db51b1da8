//! Command handlers.

pub mod api;
pub mod auth;
pub mod config;
