//! Route geometry helpers.

pub mod polyline;

pub use polyline::{decode, encode};
