//! Assembles a runnable bus: one [`Router`] plus a handful of in-process
//! demo endpoints, wired through an [`InProcessRegistry`] since the
//! transport layer proper is out of scope. Mirrors the role
//! `reticulumd::bootstrap` plays for its own daemon — the binary's `main`
//! is a thin CLI/logging shell around this.

use std::time::Duration;

use msgbus_endpoint::{Endpoint, EndpointConfig};
use msgbus_router::{Router, RouterConfig};
use msgbus_transport::{InProcessAcceptor, InProcessRegistry};
use msgbus_wire::{EndpointId, MessageId, MessagePriority};

/// A bound `"msgbus" "heartbeat"` message id every demo endpoint
/// subscribes to, so a freshly started daemon has visible traffic without
/// an external client attaching.
pub fn heartbeat_id() -> MessageId {
    MessageId::new("demo", "heartbt").expect("static ids are well-formed")
}

/// Owns the router and the demo endpoints attached to it for the lifetime
/// of the process. `registry` is leaked to `'static` once at startup (see
/// [`DemoBus::build`]) since the acceptor the router holds must outlive
/// every connection it ever accepted.
pub struct DemoBus {
    router: Router,
    endpoints: Vec<Endpoint>,
}

impl DemoBus {
    /// Builds a router from `router_config`, attaches an in-process
    /// acceptor, and connects `endpoint_count` demo endpoints that
    /// subscribe to the heartbeat id and take turns broadcasting it.
    pub fn build(router_config: RouterConfig, endpoint_count: usize, max_data_size: usize) -> Self {
        let registry: &'static InProcessRegistry =
            Box::leak(Box::new(InProcessRegistry::new(max_data_size)));
        let mut router = Router::new(router_config);
        router.add_acceptor(Box::new(InProcessAcceptor::new(registry)));

        let mut endpoints = Vec::with_capacity(endpoint_count);
        for _ in 0..endpoint_count {
            let mut endpoint = Endpoint::new(EndpointConfig::default());
            endpoint
                .attach_connection(Box::new(registry.connect()))
                .expect("freshly built endpoint has no connection yet");
            endpoint.subscribe(heartbeat_id());
            endpoints.push(endpoint);
        }

        DemoBus { router, endpoints }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// One cooperative tick across the router and every demo endpoint,
    /// draining admission first so newly attached endpoints get an id
    /// before anything tries to publish through them.
    pub fn tick(&mut self) -> bool {
        let mut any = false;
        any |= self.router.do_work(1);
        for endpoint in &mut self.endpoints {
            any |= endpoint.do_work();
        }
        any
    }

    /// Has endpoint 0 broadcast a heartbeat if it has finished admission;
    /// a no-op otherwise (the next tick will retry once it is confirmed).
    pub fn broadcast_heartbeat(&mut self) -> bool {
        let Some(endpoint) = self.endpoints.first_mut() else {
            return false;
        };
        if !endpoint.is_confirmed() {
            return false;
        }
        endpoint.send(
            heartbeat_id(),
            EndpointId::BROADCAST,
            &[],
            MessagePriority::Low,
        )
    }

    /// Runs `ticks` cooperative passes, each followed by `between`, and
    /// returns the number of ticks that made observable progress. Used by
    /// both the daemon's bounded test mode (`--ticks`) and integration
    /// tests that don't want to loop forever.
    pub fn run_ticks(&mut self, ticks: u64, between: Duration) -> u64 {
        let mut progressed = 0;
        for n in 0..ticks {
            if n % 40 == 0 {
                self.broadcast_heartbeat();
            }
            if self.tick() {
                progressed += 1;
            }
            if !between.is_zero() {
                std::thread::sleep(between);
            }
        }
        progressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_endpoints_complete_admission_within_a_bounded_number_of_ticks() {
        let mut bus = DemoBus::build(RouterConfig::default(), 3, 4096);
        for _ in 0..50 {
            bus.tick();
        }
        assert_eq!(bus.endpoint_count(), 3);
        assert_eq!(bus.router().node_count(), 3);
    }

    #[test]
    fn heartbeat_reaches_every_other_demo_endpoint() {
        let mut bus = DemoBus::build(RouterConfig::default(), 3, 4096);
        for _ in 0..50 {
            bus.tick();
        }
        assert!(bus.broadcast_heartbeat());
        for _ in 0..20 {
            bus.tick();
        }
        for endpoint in &mut bus.endpoints[1..] {
            assert!(
                endpoint.try_receive(&heartbeat_id()).is_some(),
                "every subscribed endpoint should observe the broadcast heartbeat"
            );
        }
    }

    #[test]
    fn run_ticks_reports_progress_while_admission_is_settling() {
        let mut bus = DemoBus::build(RouterConfig::default(), 2, 4096);
        let progressed = bus.run_ticks(30, Duration::ZERO);
        assert!(progressed > 0);
    }
}
