//! CKAN catalog client library
//!
//! Read-only access to a CKAN open-data portal: typed queries, normalized
//! records, streaming resource downloads, and a JSON tool dispatcher for
//! agent hosts.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod query;
pub mod transport;

pub use client::CatalogClient;
pub use dispatch::{Command, Dispatcher, ToolResponse};
pub use error::{ClientError, ErrorKind};
