//! The ShutterPay payment server.
//!
//! A thin actix-web surface over the payment engine: provider webhooks in, checkout sessions and payouts out.
//! Everything financially interesting lives in `shutter_payment_engine`; this crate owns configuration, webhook
//! verification, DTOs and route wiring.
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod notifications;
pub mod routes;
pub mod server;
pub mod webhook_routes;
