//! # Order sync server
//! This crate hosts the HTTP service around the order sync engine. It is responsible for:
//! Listening for webhook notifications from the payment gateway and queueing a pull for the remote order.
//! Letting checkout push a local order to the gateway before payment is taken.
//! Letting operators re-sync a remote order by hand.
//! Running the background worker that executes scheduled pulls and deferred webhook transitions.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/gateway/webhook`: Receives gateway notifications. Always answers 200.
//! * `/api/orders/{id}/push`: Pushes a local order to the gateway.
//! * `/api/sync/{remote_order_id}`: Pulls a remote order immediately.

pub mod cli;
pub mod config;
pub mod errors;

pub mod data_objects;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
