use std::time::Duration;

use msgbus_router::RouterConfig;
use msgbusd::DemoBus;

#[test]
fn bounded_run_settles_every_demo_endpoint_behind_the_router() {
    let mut bus = DemoBus::build(RouterConfig::default(), 4, 4096);
    bus.run_ticks(200, Duration::ZERO);
    assert_eq!(bus.router().node_count(), 4);
}
