//! Remote authoritative store client for BDPA.
//!
//! The sync engine replays queued mutations through the [`RemoteStore`]
//! trait; [`RemoteClient`] is the production implementation against the
//! records REST API and the object-storage upload endpoint. The error type
//! separates version conflicts (never retried) from transport failures
//! (retried up to the configured budget).

mod client;
mod config;
mod error;
mod remote;

pub use client::RemoteClient;
pub use config::RemoteConfig;
pub use error::{RemoteError, RemoteResult};
pub use remote::RemoteStore;
