//! strike-daemon: settlement watcher for the Strike expiry price oracle.
//!
//! Single OS process running a Tokio async runtime. On every tick the daemon
//! reloads the persisted oracle (other processes write prices into the same
//! database), announces newly finalized prices on the event bus and records
//! how far it got.

mod config;
mod events;
mod watcher;

use std::sync::Arc;
use std::time::Duration;

use strike_db::queries::oracle as oracle_db;
use strike_oracle::{Clock, Oracle, SystemClock};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::events::{Event, EventBus, EventFilter};
use crate::watcher::FinalizationWatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strike=info".parse()?)
                .add_directive(format!("strike_daemon={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("Strike daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = data_dir.join("strike.db");
    let mut conn = strike_db::open(&db_path)?;
    info!(path = %db_path.display(), "database open");

    // 3. Load or create the oracle
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let oracle = match oracle_db::load_state(&conn)? {
        Some(state) => Oracle::from_state(state, clock.clone()),
        None => {
            let owner = config.oracle.owner()?;
            if owner.is_zero() {
                warn!("no oracle owner configured; administration will be impossible");
            }
            let oracle = Oracle::with_lock_window(
                config.oracle.address()?,
                owner,
                config.oracle.lock_window_secs,
                clock.clone(),
            );
            oracle_db::save_state(&mut conn, &oracle.state())?;
            info!(oracle = %oracle.address(), owner = %owner, "created new oracle");
            oracle
        }
    };
    info!(
        oracle = %oracle.address(),
        lock_window = oracle.lock_window(),
        pending = oracle.pending_records().len(),
        "oracle loaded"
    );

    // 4. Create event bus and its log subscriber
    let event_bus = EventBus::new(config.watcher.event_buffer);
    let log_filter = EventFilter {
        event_types: (!config.watcher.log_event_types.is_empty())
            .then(|| config.watcher.log_event_types.clone()),
        assets: None,
    };
    let mut log_rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match log_rx.recv().await {
                Ok(event) if log_filter.matches(&event) => {
                    info!(
                        event_type = %event.event_type,
                        payload = %event.payload,
                        "event"
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event log subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    event_bus.emit(Event {
        event_type: "DaemonStarted".to_string(),
        timestamp: clock.now(),
        payload: serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "oracle": oracle.address().to_string(),
        }),
    });

    // 5. Poll until shutdown
    let mut watcher = FinalizationWatcher::resume(&conn)?;
    info!(last_poll = watcher.last_poll(), "watcher resumed");
    let mut interval =
        tokio::time::interval(Duration::from_secs(config.watcher.poll_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match watcher::poll_once(&conn, &clock, &mut watcher, &event_bus) {
                    Ok(0) => {}
                    Ok(announced) => info!(announced, "finalized prices announced"),
                    Err(e) => error!("watcher poll failed: {e:#}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    info!(events = event_bus.sequence(), "Daemon stopped");
    Ok(())
}

