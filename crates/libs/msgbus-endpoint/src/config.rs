use std::time::Duration;

/// Endpoint-side timing knobs, read from `msgbus.endpoint.*` configuration
/// keys.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// How long to wait for the router to assign (or confirm) an id before
    /// re-announcing, read from `msg_bus.endpoint.no_id_timeout` (default 3s).
    pub no_id_timeout: Duration,
    /// Period between unsolicited `"stillAlive"` broadcasts, read from
    /// `msg_bus.endpoint.alive_notify_period` (default 30s).
    pub alive_notify_period: Duration,
    /// BLOB size cap, shared with the endpoint's own BLOB manipulator.
    pub blob_size_cap_bytes: i64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            no_id_timeout: Duration::from_secs(3),
            alive_notify_period: Duration::from_secs(30),
            blob_size_cap_bytes: msgbus_blob::DEFAULT_SIZE_CAP_BYTES,
        }
    }
}
