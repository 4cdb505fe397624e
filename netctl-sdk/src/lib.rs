//! SDK for managing the subnet routes of devices through the control-plane HTTP APIs.
//!
//! - `api`: the HTTP client and the route APIs.
//! - `config`: client configurations from command-line arguments and environment variables.
//! - `logger`: the console logger for applications that use this SDK.

pub mod api;
pub mod config;
pub mod logger;
