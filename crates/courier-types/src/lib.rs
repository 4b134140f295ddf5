//! Value records shared between the courier client runtime and its front ends.
//!
//! These mirror the backend's JSON shapes (camelCase keys). They carry no
//! business rules; the backend owns those.

mod auth;
mod geo;
mod records;

pub use auth::{LoginRequest, SessionGrant, TokenPair};
pub use geo::GeoPoint;
pub use records::{
    Address, Courier, CourierStatus, Delivery, DeliveryStatus, Package, PlannedRoute,
    RouteRequest, TrackingInfo,
};
