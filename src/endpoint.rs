//! Canonical paths for the hub REST surface.
//!
//! Every request the client issues resolves one of these templates; the
//! version query is what pins the wire contract with the remote service.

/// REST API version understood by the remote service.
pub const API_VERSION: &str = "2015-08-15-preview";

/// The fixed query parameter appended to every request path.
pub const VERSION_QUERY: &str = "api-version=2015-08-15-preview";

/// Path for device-to-cloud events sent as `device_id`.
pub fn event_path(device_id: &str) -> String {
    format!("/devices/{device_id}/messages/events")
}

/// Path for the cloud-to-device message queue of `device_id`.
pub fn message_path(device_id: &str) -> String {
    format!("/devices/{device_id}/messages/devicebound")
}

/// Path addressing a specific dequeued message, identified by its lock
/// token, for acknowledgement.
pub fn feedback_path(device_id: &str, lock_token: &str) -> String {
    format!("{}/{lock_token}", message_path(device_id))
}

/// Registry path for a single device entry.
pub fn device_path(device_id: &str) -> String {
    format!("/devices/{device_id}")
}
