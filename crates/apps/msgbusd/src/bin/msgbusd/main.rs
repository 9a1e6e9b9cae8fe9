use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use msgbus_router::RouterConfig;
use msgbusd::DemoBus;

/// Stand-alone message bus router: loads a TOML config, starts a router
/// with a handful of in-process demo endpoints attached, and drives the
/// cooperative `do_work`/`do_maintenance` loop until interrupted.
#[derive(Parser, Debug)]
#[command(name = "msgbusd")]
struct Args {
    /// Path to a TOML config file with a `[router]` table
    /// (`msgbus.router.*` keys). Missing keys fall back
    /// to `RouterConfig::default()`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `router.id_major` from the config file.
    #[arg(long)]
    id_major: Option<u32>,

    /// Overrides `router.id_minor` from the config file.
    #[arg(long)]
    id_minor: Option<u32>,

    /// Number of in-process demo endpoints to attach at startup.
    #[arg(long, default_value_t = 3)]
    demo_endpoints: usize,

    /// Run this many cooperative ticks and exit instead of looping
    /// forever. Mainly for smoke-testing a packaged build.
    #[arg(long)]
    ticks: Option<u64>,

    /// Delay between ticks.
    #[arg(long, default_value_t = 50)]
    tick_millis: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut router_config = match &args.config {
        Some(path) => match msgbusd::load_config(path) {
            Ok(config) => config.router_config(),
            Err(err) => {
                log::error!("failed to load config from {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => RouterConfig::default(),
    };
    if let Some(id_major) = args.id_major {
        router_config.id_major = id_major;
    }
    if let Some(id_minor) = args.id_minor {
        router_config.id_minor = id_minor;
    }

    log::info!(
        "starting msgbusd: id range base {:#x}, {} demo endpoint(s)",
        router_config.base(),
        args.demo_endpoints,
    );

    let mut bus = DemoBus::build(router_config, args.demo_endpoints, 65536);
    let between = Duration::from_millis(args.tick_millis);

    match args.ticks {
        Some(ticks) => {
            let progressed = bus.run_ticks(ticks, between);
            log::info!("ran {ticks} ticks, {progressed} made observable progress");
        }
        None => {
            let mut n: u64 = 0;
            loop {
                if n % 40 == 0 {
                    bus.broadcast_heartbeat();
                }
                bus.tick();
                if !between.is_zero() {
                    std::thread::sleep(between);
                }
                n = n.wrapping_add(1);
            }
        }
    }
}
