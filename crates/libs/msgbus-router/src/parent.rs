use std::time::{Duration, Instant};

use msgbus_transport::Connection;
use msgbus_wire::EndpointId;

/// How long a parent link waits for `"confirmId"` before retrying its
/// `"announceId"`/`"requestId"` handshake.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

/// At most one uplink to another router, forming the bus tree.
pub struct ParentLink {
    pub connection: Box<dyn Connection>,
    pub confirmed_id: Option<EndpointId>,
    pub confirm_timeout: Duration,
    last_attempt: Instant,
    requested_id: bool,
}

impl ParentLink {
    pub fn new(connection: Box<dyn Connection>) -> Self {
        ParentLink {
            connection,
            confirmed_id: None,
            confirm_timeout: CONFIRM_TIMEOUT,
            last_attempt: Instant::now() - CONFIRM_TIMEOUT,
            requested_id: false,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_id.is_some()
    }

    /// Whether it is time to (re)send the id-request/announce handshake:
    /// either it has never been attempted, or the timeout elapsed without
    /// a confirmation.
    pub fn due_for_retry(&self) -> bool {
        !self.is_confirmed() && self.last_attempt.elapsed() > self.confirm_timeout
    }

    pub fn mark_attempted(&mut self) {
        self.last_attempt = Instant::now();
        self.requested_id = true;
    }

    pub fn confirm(&mut self, id: EndpointId) {
        self.confirmed_id = Some(id);
    }

    pub fn has_requested(&self) -> bool {
        self.requested_id
    }
}
