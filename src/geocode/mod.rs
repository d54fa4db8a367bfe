//! Geocoding through the GSI address-search API

pub mod client;

pub use client::{Coordinates, GeocodeError, GeocoderClient};
