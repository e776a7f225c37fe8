//! Print every TPI Advanced event seen on the network.
//!
//! Usage: tpi-monitor [--controller 192.168.1.50] [--enable-events] [--json]
//!
//! Log verbosity follows RUST_LOG (e.g. `RUST_LOG=zentpi=debug`).

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use zentpi::config::{DEFAULT_PORT, MULTICAST_GROUP, MULTICAST_PORT};
use zentpi::protocol::query::Version;
use zentpi::protocol::tpi::EventMode;
use zentpi::{
    Command, ControllerIdentity, ControllerRegistry, Event, EventFilter, Listener, ListenerConfig,
    SessionConfig,
};

#[derive(Parser, Debug)]
#[command(name = "tpi-monitor", about = "Listen for TPI Advanced events")]
struct Args {
    /// Multicast group to join.
    #[arg(long, default_value_t = MULTICAST_GROUP)]
    group: Ipv4Addr,

    /// Multicast port.
    #[arg(long, default_value_t = MULTICAST_PORT)]
    port: u16,

    /// Local interface address to join the group on.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    interface: Ipv4Addr,

    /// Also listen for unicast events on this local address.
    #[arg(long)]
    unicast: Option<SocketAddr>,

    /// Do not join the multicast group.
    #[arg(long)]
    no_multicast: bool,

    /// Controller to query (IP, or IP:port).
    #[arg(long)]
    controller: Vec<String>,

    /// Turn on multicast event emission on each --controller.
    #[arg(long)]
    enable_events: bool,

    /// Print events as JSON lines (builds with the `json` feature only).
    #[arg(long)]
    json: bool,
}

fn parse_controller(s: &str) -> Option<SocketAddr> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some(addr);
    }
    let ip: Ipv4Addr = s.parse().ok()?;
    Some(SocketAddr::V4(SocketAddrV4::new(ip, DEFAULT_PORT)))
}

fn print_event(args: &Args, event: &Event) {
    if args.json {
        if let Some(line) = to_json(event) {
            println!("{line}");
            return;
        }
    }
    println!("{event}");
}

#[cfg(feature = "json")]
fn to_json(event: &Event) -> Option<String> {
    serde_json::to_string(event)
        .map_err(|e| warn!("cannot serialize event: {e}"))
        .ok()
}

#[cfg(not(feature = "json"))]
fn to_json(_event: &Event) -> Option<String> {
    None
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Arc::new(Args::parse());
    if args.json && cfg!(not(feature = "json")) {
        warn!("built without the json feature; printing events as text");
    }

    let mut config = ListenerConfig::default()
        .with_multicast(!args.no_multicast)
        .with_multicast_group(args.group, args.port)
        .with_interface(args.interface);
    if let Some(bind) = args.unicast {
        config = config.with_unicast(bind);
    }

    let listener = Arc::new(Listener::new(config));
    {
        let args = args.clone();
        listener.subscribe(EventFilter::All, move |ev| print_event(&args, ev));
    }
    if let Err(e) = listener.start() {
        error!("cannot start listener: {e}");
        return ExitCode::FAILURE;
    }

    let registry = ControllerRegistry::new(SessionConfig::default()).with_sink(listener.clone());
    for raw in &args.controller {
        let Some(addr) = parse_controller(raw) else {
            warn!("ignoring bad controller address {raw:?}");
            continue;
        };
        let session = match registry.for_controller(ControllerIdentity::new(addr)) {
            Ok(s) => s,
            Err(e) => {
                error!("{addr}: {e}");
                continue;
            }
        };
        match session.query::<Version>(&Command::query_controller_version()) {
            Ok(Some(v)) => info!("{addr}: firmware {v}"),
            Ok(None) => info!("{addr}: no version reported"),
            Err(e) => warn!("{addr}: version query failed: {e}"),
        }
        match session.query::<String>(&Command::query_controller_label()) {
            Ok(Some(label)) => info!("{addr}: label {label:?}"),
            Ok(None) => {}
            Err(e) => warn!("{addr}: label query failed: {e}"),
        }
        if args.enable_events {
            match session.enable_event_emit(EventMode::default()) {
                Ok(true) => info!("{addr}: event emission enabled"),
                Ok(false) => warn!("{addr}: controller did not confirm event mode"),
                Err(e) => warn!("{addr}: enabling events failed: {e}"),
            }
        }
    }

    info!("listening on {:?}; Ctrl-C to exit", listener.local_addrs());
    loop {
        std::thread::park();
    }
}
