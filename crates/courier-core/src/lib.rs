//! Courier client runtime: session credentials, the authenticated API client,
//! route geometry decoding and background tracking.

pub mod api;
pub mod config;
pub mod geometry;
pub mod session;
pub mod tracking;
