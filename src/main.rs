use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, Level};

use serpent_arena_server::config::SimConfig;
use serpent_arena_server::game::clock::SystemClock;
use serpent_arena_server::game::scheduler::TickScheduler;
use serpent_arena_server::game::simulation::{Recipient, Simulation};
use serpent_arena_server::game::stats::InMemoryStats;
use serpent_arena_server::metrics::Metrics;
use serpent_arena_server::net::protocol;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Serpent Arena Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = SimConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: {}x{} map, trust={}, bots={}, workers={}",
        config.map.width, config.map.height, config.trust_mode, config.bots.count, config.collision_workers
    );

    let metrics = Arc::new(Metrics::new());
    let stats = Arc::new(InMemoryStats::new());
    let sim = Simulation::new(config, Arc::new(SystemClock), stats, metrics.clone())?;

    let (mut scheduler, mut outbound) = TickScheduler::new(Arc::new(Mutex::new(sim)));
    scheduler.start();

    // Without a session layer attached, encode and drop outbound traffic
    let drain = tokio::spawn(async move {
        let mut sent_bytes: u64 = 0;
        while let Some(out) = outbound.recv().await {
            match protocol::encode(&out.message) {
                Ok(bytes) => sent_bytes += bytes.len() as u64,
                Err(e) => debug!("Dropping unencodable message: {}", e),
            }
            if let Recipient::All = out.recipient {
                debug!("Broadcast message ({} bytes encoded so far)", sent_bytes);
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    scheduler.stop();
    drop(scheduler);
    drain.abort();
    info!(
        "Server stopped after {} ticks",
        metrics.tick_count.load(Ordering::Relaxed)
    );

    Ok(())
}
