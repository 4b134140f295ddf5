//! The remote operation catalog.

use courier_types::{
    Address, Courier, Delivery, GeoPoint, LoginRequest, Package, PlannedRoute, RouteRequest,
    SessionGrant, TrackingInfo,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::client::{ApiClient, ApiRequest};
use super::error::ApiResult;
use crate::geometry::polyline;

/// A backend collection supporting list/get/create/update/delete.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync {
    /// Collection path, e.g. `/api/deliveries`.
    const PATH: &'static str;
    /// Singular name for logs and messages.
    const NAME: &'static str;
}

impl Resource for Delivery {
    const PATH: &'static str = "/api/deliveries";
    const NAME: &'static str = "delivery";
}

impl Resource for Courier {
    const PATH: &'static str = "/api/couriers";
    const NAME: &'static str = "courier";
}

impl Resource for Package {
    const PATH: &'static str = "/api/packages";
    const NAME: &'static str = "package";
}

impl Resource for Address {
    const PATH: &'static str = "/api/addresses";
    const NAME: &'static str = "address";
}

/// Wire shape of `POST /api/routes`; geometry is still encoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteResponse {
    distance_meters: f64,
    duration_seconds: f64,
    #[serde(default)]
    geometry: String,
}

impl From<RouteResponse> for PlannedRoute {
    fn from(route: RouteResponse) -> Self {
        PlannedRoute {
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
            points: polyline::decode(&route.geometry),
        }
    }
}

fn item_path<R: Resource>(id: i64) -> String {
    format!("{}/{id}", R::PATH)
}

impl ApiClient {
    pub async fn list<R: Resource>(&self) -> ApiResult<Vec<R>> {
        self.execute(ApiRequest::new(Method::GET, R::PATH)).await
    }

    pub async fn get<R: Resource>(&self, id: i64) -> ApiResult<R> {
        let path = item_path::<R>(id);
        self.execute(ApiRequest::new(Method::GET, &path)).await
    }

    /// Creates a record; the backend answers with the stored copy (including its id).
    pub async fn create<R: Resource>(&self, record: &R) -> ApiResult<R> {
        self.execute(ApiRequest::new(Method::POST, R::PATH).json(record)?)
            .await
    }

    pub async fn update<R: Resource>(&self, id: i64, record: &R) -> ApiResult<R> {
        let path = item_path::<R>(id);
        self.execute(ApiRequest::new(Method::PUT, &path).json(record)?)
            .await
    }

    pub async fn delete<R: Resource>(&self, id: i64) -> ApiResult<()> {
        let path = item_path::<R>(id);
        tracing::debug!(resource = R::NAME, id, "Deleting");
        self.execute_unit(ApiRequest::new(Method::DELETE, &path))
            .await
    }

    /// Deliveries currently assigned to a courier.
    pub async fn courier_deliveries(&self, courier_id: i64) -> ApiResult<Vec<Delivery>> {
        let path = format!("{}/{courier_id}/deliveries", Courier::PATH);
        self.execute(ApiRequest::new(Method::GET, &path)).await
    }

    pub async fn courier_location(&self, courier_id: i64) -> ApiResult<GeoPoint> {
        let path = format!("{}/{courier_id}/location", Courier::PATH);
        self.execute(ApiRequest::new(Method::GET, &path)).await
    }

    pub async fn tracking_info(&self, delivery_id: i64) -> ApiResult<TrackingInfo> {
        let path = format!("/api/tracking/{delivery_id}");
        self.execute(ApiRequest::new(Method::GET, &path)).await
    }

    /// Plans a route and decodes its geometry.
    ///
    /// A malformed geometry yields fewer (or no) points, never an error.
    pub async fn plan_route(&self, request: &RouteRequest) -> ApiResult<PlannedRoute> {
        let route: RouteResponse = self
            .execute(ApiRequest::new(Method::POST, "/api/routes").json(request)?)
            .await?;
        Ok(route.into())
    }

    /// Exchanges credentials for a session. Does not touch the session store.
    pub async fn login(&self, credentials: &LoginRequest) -> ApiResult<SessionGrant> {
        let request = ApiRequest::new(Method::POST, "/api/auth/login")
            .json(credentials)?
            .unauthenticated();
        self.execute(request).await
    }
}
