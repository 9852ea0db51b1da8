//! Core keygate library (identity-provider client, session store, auth state, API pipeline).

pub mod api;
pub mod auth;
pub mod config;
