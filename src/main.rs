use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &firebase_bootstrap::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        project_id = %cfg.app.project_id,
        auth_domain = %cfg.app.auth_domain,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        oauth = cfg.oauth.is_some(),
        loglevel = %cfg.loglevel
    );

    let backend = firebase_bootstrap::bootstrap::init(cfg)?;

    match backend.auth().restore_persisted_user().await {
        Ok(Some(user)) => info!(uid = %user.uid, "session restored"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "failed to restore persisted session"),
    }

    let state = firebase_bootstrap::router::BootstrapState::new(backend, cfg)?;
    let app = firebase_bootstrap::router::bootstrap_router(state);

    let listener = TcpListener::bind(cfg.server.listen).await?;
    info!("HTTP server listening on {}", cfg.server.listen);
    axum::serve(listener, app).await?;
    Ok(())
}
