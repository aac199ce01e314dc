//! kvserve: a multi-engine in-memory key/value server
//!
//! One thread, one readiness multiplexer. Line-oriented text commands are
//! executed against three storage backends (a linear array, a red/black
//! tree, and a chained hash table) selected by the verb prefix. The same
//! listener also answers plain HTTP requests and WebSocket echo traffic,
//! classified per connection on the first request.

mod config;
mod error;
mod protocols;
mod reactor;
mod store;

use config::Config;
use protocols::{Dispatcher, EchoHandler};
use reactor::Reactor;
use store::Stores;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        port_count = config.port_count,
        buffer_size = config.buffer_size,
        max_connections = config.max_connections,
        "Starting kvserve"
    );

    let mut reactor = Reactor::bind(&config)?;
    if config.echo {
        reactor.run(&mut EchoHandler)?;
    } else {
        // The engines live inside the dispatcher and are handed to every
        // handler call; there is no global state.
        let mut dispatcher = Dispatcher::new(Stores::new());
        reactor.run(&mut dispatcher)?;
    }

    Ok(())
}
