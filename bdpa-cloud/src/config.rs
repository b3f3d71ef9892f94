//! Remote store configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the remote store client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL for the records API (e.g. "https://api.bdpa-obras.cl").
    pub api_base_url: String,

    /// Object-storage bucket photos are uploaded to.
    pub storage_bucket: String,

    /// Per-request timeout in seconds. A timeout is a transport failure
    /// subject to the normal retry policy.
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.bdpa-obras.cl".to_string(),
            storage_bucket: "avances-fotos".to_string(),
            request_timeout_secs: 30,
        }
    }
}
