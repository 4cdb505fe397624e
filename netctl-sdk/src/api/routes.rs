//! Subnet routes of a device.
//!
//! ```rust,no_run
//! use netctl_sdk::api::{
//!     http::{Client, Error},
//!     routes::{self, IpNet},
//! };
//!
//! async fn enable(client: &Client) -> Result<(), Error> {
//!     let subnets: Vec<IpNet> = vec!["10.0.0.0/24".parse().unwrap()];
//!     let routes = routes::set(client, "DEVICE_ID", &subnets).await?;
//!     println!("enabled: {:?}", routes.enabled_routes);
//!     Ok(())
//! }
//! ```

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};

pub use ipnet::IpNet;

use super::http::{self, Client, Error};

/// Subnet routes of one device.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct Routes {
    /// Routes that the device has announced it can serve.
    #[serde(rename = "advertisedRoutes", default, deserialize_with = "null_as_empty")]
    pub advertised_routes: Vec<IpNet>,
    /// Routes that have been approved to be routed by the device. They are not necessarily
    /// advertised, they may be pre-approved.
    #[serde(rename = "enabledRoutes", default, deserialize_with = "null_as_empty")]
    pub enabled_routes: Vec<IpNet>,
}

#[derive(Serialize)]
struct PostReq<'a> {
    routes: &'a [IpNet],
}

const OP_GET: &'static str = "routes::get";
const OP_SET: &'static str = "routes::set";

/// `GET /api/v2/device/{device_id}/routes`
///
/// Retrieves the advertised and the enabled subnet routes of a device.
pub async fn get(client: &Client, device_id: &str) -> Result<Routes, Error> {
    let req = match client.new_request(Method::GET, api_path(device_id).as_str(), None) {
        Err(e) => return Err(e.context(OP_GET)),
        Ok(req) => req,
    };
    exchange(client, req).await.map_err(|e| e.context(OP_GET))
}

/// `POST /api/v2/device/{device_id}/routes`
///
/// Replaces the enabled subnet routes of a device with `subnets`. Routes that are enabled now but
/// not in `subnets` will be disabled. Subnets do not need to be advertised by the device.
///
/// Returns the routes of the device after the update.
pub async fn set(client: &Client, device_id: &str, subnets: &[IpNet]) -> Result<Routes, Error> {
    let body = match serde_json::to_vec(&PostReq { routes: subnets }) {
        Err(e) => return Err(Error::Request(Box::new(e)).context(OP_SET)),
        Ok(body) => Some(Bytes::from(body)),
    };
    let req = match client.new_request(Method::POST, api_path(device_id).as_str(), body) {
        Err(e) => return Err(e.context(OP_SET)),
        Ok(req) => req,
    };
    exchange(client, req).await.map_err(|e| e.context(OP_SET))
}

fn api_path(device_id: &str) -> String {
    format!("/api/v2/device/{}/routes", device_id)
}

/// Send the request and decode the routes.
async fn exchange(client: &Client, req: reqwest::Request) -> Result<Routes, Error> {
    let (status, body) = client.send_request(req).await?;
    // Other 2xx are errors too.
    if status != StatusCode::OK {
        return Err(http::handle_error_response(status, &body));
    }
    match serde_json::from_slice::<Routes>(&body) {
        Err(e) => Err(Error::MalformedResponse(e)),
        Ok(routes) => Ok(routes),
    }
}

/// Missing and `null` lists are empty lists.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<IpNet>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<IpNet>>::deserialize(deserializer)?.unwrap_or_default())
}
