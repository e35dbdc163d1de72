//! echo-reactor: an echo client
//!
//! Connects to an echo peer and writes back every byte it receives until the
//! peer closes the connection.
//!
//! Features:
//! - Single-threaded reactor (epoll on Linux, kqueue on macOS)
//! - Any number of concurrent sessions on one reactor
//! - Configuration via CLI arguments or TOML file

use echo_reactor::client::connect_and_echo;
use echo_reactor::config::Config;
use echo_reactor::net::ConnectOptions;
use echo_reactor::runtime::Reactor;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        connect = %config.connect,
        sessions = config.sessions,
        buffer_size = config.buffer_size,
        nodelay = config.nodelay,
        "Starting echo-reactor"
    );

    let reactor = match Reactor::with_capacity(config.events) {
        Ok(reactor) => reactor,
        Err(e) => {
            error!(error = %e, "Failed to create reactor");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let handle = reactor.handle();
    let options = ConnectOptions {
        nodelay: config.nodelay,
    };
    for _ in 0..config.sessions {
        reactor.add(connect_and_echo(
            &handle,
            config.connect,
            &options,
            config.buffer_size,
        ));
    }

    // Session failures are reported by the sessions themselves
    match reactor.run() {
        Ok(()) => {
            info!("All sessions finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Reactor failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
