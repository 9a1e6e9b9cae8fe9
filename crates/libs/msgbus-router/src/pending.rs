use std::time::Instant;

use msgbus_transport::Connection;
use msgbus_wire::{ConnectionKind, EndpointId};

/// An accepted raw connection that has not yet completed admission.
pub struct PendingConnection {
    pub connection: Box<dyn Connection>,
    pub accepted_at: Instant,
    pub id: Option<EndpointId>,
    pub maybe_router: bool,
    /// `None` once the peer has announced itself as an endpoint.
    pub is_endpoint: bool,
    /// `true` once the router has sent its password challenge — sent
    /// only once, and only after an id is known.
    pub password_requested: bool,
    pub password_verified: bool,
    pub nonce: Option<Vec<u8>>,
}

impl PendingConnection {
    pub fn new(connection: Box<dyn Connection>) -> Self {
        let is_in_process = connection.kind() == ConnectionKind::InProcess;
        PendingConnection {
            connection,
            accepted_at: Instant::now(),
            id: None,
            maybe_router: false,
            is_endpoint: true,
            password_requested: false,
            // In-process connections never travel a real wire, so the
            // shared-password challenge (meant to authenticate a remote
            // peer) is pointless for them.
            password_verified: is_in_process,
            nonce: None,
        }
    }

    pub fn is_too_old(&self, timeout: std::time::Duration) -> bool {
        self.accepted_at.elapsed() > timeout
    }

    pub fn is_in_process(&self) -> bool {
        self.connection.kind() == ConnectionKind::InProcess
    }

    pub fn ready_to_adopt(&self) -> bool {
        self.id.is_some() && self.password_verified
    }
}
