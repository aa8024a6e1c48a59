/*
This crate is a REST client for a cloud messaging hub.

It provides tools to send device-to-cloud telemetry (single events and
batches), receive queued cloud-to-device messages and acknowledge them, and
manage the hub's device registry, issuing one authenticated request per
operation with no state shared between calls.
*/

mod batch;
mod client;
mod config;
pub mod endpoint;
mod message;
mod token;
mod util;

pub use batch::encode_batch;
pub use client::{
    FeedbackAction, HubClient, ParseFeedbackActionError, Reply, RequestError, ResponseParts,
};
pub use config::{ConfigError, ConnectionConfig};
pub use message::Message;
pub use token::{an_hour_from_now, SasToken, TokenError};
pub use util::http::{Client, ClientError, Headers, Response, Uri};
