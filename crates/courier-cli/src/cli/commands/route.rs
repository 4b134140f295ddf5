//! Route planning command.

use anyhow::Result;
use courier_types::{GeoPoint, RouteRequest};

use super::Context;
use super::polyline::parse_point;

pub async fn run(ctx: &Context, from: (f64, f64), to: (f64, f64), via: &[String]) -> Result<()> {
    let waypoints = via
        .iter()
        .map(|raw| parse_point(raw))
        .collect::<Result<Vec<_>>>()?;

    let request = RouteRequest {
        origin: GeoPoint::from(from),
        destination: GeoPoint::from(to),
        waypoints,
    };
    let route = ctx.client.plan_route(&request).await?;

    println!(
        "Distance: {:.0} m, duration: {:.0} s, {} points",
        route.distance_meters,
        route.duration_seconds,
        route.points.len()
    );
    for point in &route.points {
        println!("{point}");
    }
    Ok(())
}
