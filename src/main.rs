//! Visage HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;

use visage::audit::{
    AuditConfig, KeyTouchWriter, PgKeyTouchFlusher, ProviderEventWriter, SearchAuditWriter,
};
use visage::config::Config;
use visage::gateway::{AppState, create_router_with_state};
use visage::provider::build_provider;
use visage::ratelimit::{PgRateLimiter, RateLimiter};
use visage::service::FaceService;
use visage::store::{FaceStore, PgFaceStore};
use visage::tenant::{PgTenantDirectory, TenantResolver};
use visage::widget::{PgSessionStore, WidgetService};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Cadence of the housekeeping loop; other sweeps derive from it.
const HOUSEKEEPING_TICK: Duration = Duration::from_secs(5 * 60);
/// Widget sessions are reaped every other tick (10 min).
const SESSION_REAP_EVERY: u64 = 2;
/// Rate counters are collected every twelfth tick (1 h).
const RATE_CLEANUP_EVERY: u64 = 12;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        r#"
██╗   ██╗██╗███████╗ █████╗  ██████╗ ███████╗
██║   ██║██║██╔════╝██╔══██╗██╔════╝ ██╔════╝
██║   ██║██║███████╗███████║██║  ███╗█████╗
╚██╗ ██╔╝██║╚════██║██╔══██║██║   ██║██╔══╝
 ╚████╔╝ ██║███████║██║  ██║╚██████╔╝███████╗
  ╚═══╝  ╚═╝╚══════╝╚═╝  ╚═╝ ╚═════╝ ╚══════╝

        FACES. TENANTS. NOTHING SHARED.
                                        AGPL-3.0
"#
    );

    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        provider = config.provider_type.as_str(),
        "Visage starting"
    );

    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;
    tracing::info!("Database migrations applied");

    let store: Arc<dyn FaceStore> = Arc::new(PgFaceStore::new(pool.clone()));
    let limiter: Arc<dyn RateLimiter> = Arc::new(PgRateLimiter::new(pool.clone()));

    let provider_events = Arc::new(ProviderEventWriter::spawn(AuditConfig::default()));
    let search_audit = Arc::new(SearchAuditWriter::spawn(
        store.clone(),
        AuditConfig::default(),
    ));
    let key_touch = Arc::new(KeyTouchWriter::spawn(
        Arc::new(PgKeyTouchFlusher::new(pool.clone())),
        AuditConfig::default(),
    ));

    let provider = build_provider(&config, provider_events.clone())?;

    let resolver = Arc::new(TenantResolver::new(
        Arc::new(PgTenantDirectory::new(pool.clone())),
        config.api_key_secret.clone(),
        config.admin_token.clone(),
        key_touch.clone(),
    ));

    let faces = Arc::new(FaceService::new(
        provider,
        store,
        limiter.clone(),
        search_audit.clone(),
    ));
    let widget = Arc::new(WidgetService::new(
        Arc::new(PgSessionStore::new(pool.clone())),
        resolver.clone(),
        faces.clone(),
    ));

    let housekeeping = spawn_housekeeping(limiter.clone(), widget.clone(), key_touch.clone());

    let state = AppState::new(faces, widget, resolver, limiter, Some(pool));
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    housekeeping.abort();

    tracing::info!("Draining audit pipelines...");
    search_audit.stop().await;
    key_touch.stop().await;
    provider_events.stop().await;

    tracing::info!("Visage shutdown complete");
    Ok(())
}

/// Container health probe: hits the local `/healthz` and exits 0/1.
///
/// Runs in the same environment as the server, so the server's own
/// configuration resolves the port; a config the server would refuse to
/// boot with falls back to the default port rather than failing the probe.
fn run_health_check() -> i32 {
    let port = Config::from_env()
        .map(|config| config.port)
        .unwrap_or_else(|_| Config::default().port);
    let url = format!("http://127.0.0.1:{port}/healthz");

    let probe = async move {
        let response = reqwest::Client::new()
            .get(&url)
            .timeout(Duration::from_secs(1))
            .send()
            .await;
        matches!(response, Ok(r) if r.status().is_success())
    };

    let healthy = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map(|rt| rt.block_on(probe))
        .unwrap_or(false);

    if healthy { 0 } else { 1 }
}

/// Periodic sweeps: debounce maps every tick, widget sessions every other
/// tick, rate counters every twelfth.
fn spawn_housekeeping(
    limiter: Arc<dyn RateLimiter>,
    widget: Arc<WidgetService>,
    key_touch: Arc<KeyTouchWriter>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOUSEKEEPING_TICK);
        interval.tick().await;
        let mut ticks: u64 = 0;

        loop {
            interval.tick().await;
            ticks += 1;

            let evicted = key_touch.sweep_debounce();
            if evicted > 0 {
                tracing::debug!(evicted, "swept key-touch debounce map");
            }

            if ticks % SESSION_REAP_EVERY == 0 {
                match widget.cleanup_expired().await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "reaped expired widget sessions");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "widget session reap failed"),
                }
            }

            if ticks % RATE_CLEANUP_EVERY == 0 {
                match limiter.cleanup_expired().await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "collected expired rate counters");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "rate counter cleanup failed"),
                }
            }
        }
    })
}

/// Resolves once the process is asked to stop (Ctrl+C or SIGTERM).
///
/// A handler that cannot be installed parks its arm forever instead of
/// aborting: losing one signal source should not take the server down.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "could not install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let signal_name = tokio::select! {
        _ = ctrl_c => "ctrl-c",
        _ = sigterm => "sigterm",
    };
    tracing::info!(signal = signal_name, "shutdown requested, draining");
}
