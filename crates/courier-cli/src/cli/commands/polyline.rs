//! Offline polyline helpers.

use anyhow::{Context, Result, bail};
use courier_core::geometry;
use courier_types::GeoPoint;

pub fn decode(encoded: &str) {
    for point in geometry::decode(encoded) {
        println!("{point}");
    }
}

pub fn encode(points: &[String]) -> Result<()> {
    let points = points
        .iter()
        .map(|raw| parse_point(raw))
        .collect::<Result<Vec<_>>>()?;
    println!("{}", geometry::encode(&points));
    Ok(())
}

/// Parses `LAT,LNG` in degrees; rejects NaN, infinities and out-of-range values.
pub fn parse_point(raw: &str) -> Result<GeoPoint> {
    let (lat, lng) = raw
        .split_once(',')
        .with_context(|| format!("expected LAT,LNG but got {raw:?}"))?;
    let latitude: f64 = lat
        .trim()
        .parse()
        .with_context(|| format!("invalid latitude in {raw:?}"))?;
    let longitude: f64 = lng
        .trim()
        .parse()
        .with_context(|| format!("invalid longitude in {raw:?}"))?;
    if !(latitude.is_finite() && (-90.0..=90.0).contains(&latitude)) {
        bail!("latitude out of range in {raw:?} (expected -90..=90)");
    }
    if !(longitude.is_finite() && (-180.0..=180.0).contains(&longitude)) {
        bail!("longitude out of range in {raw:?} (expected -180..=180)");
    }
    Ok(GeoPoint::new(latitude, longitude))
}
