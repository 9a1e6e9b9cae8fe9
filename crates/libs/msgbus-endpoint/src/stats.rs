use std::time::Instant;

/// Point-in-time counters for an endpoint, mirroring the role
/// `ConnectionStatistics` plays for a single connection.
#[derive(Debug, Clone, Copy)]
pub struct EndpointStatistics {
    pub messages_sent: u64,
    pub messages_received: u64,
    started_at: Instant,
}

impl Default for EndpointStatistics {
    fn default() -> Self {
        EndpointStatistics {
            messages_sent: 0,
            messages_received: 0,
            started_at: Instant::now(),
        }
    }
}

impl EndpointStatistics {
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Flow-control advisory broadcast by a router as `"msgFlowInf"` and
/// consumed here to decide whether to throttle outgoing traffic.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFlowInfo {
    pub avg_msg_age_ms: u32,
}
