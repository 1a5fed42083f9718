use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info};

use tlb_core::{
    commands::CommandInterpreter,
    config::{Config, SecretBackend, StoreBackend},
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    notifier::Notifier,
    pipeline::Pipeline,
    registry::PairingRegistry,
    router,
    secrets::{EnvSecretSource, SecretSource, SlackCredentials},
    store::{MemoryPairStore, PairStore},
};
use tlb_gcp::GcpSecretManager;
use tlb_slack::SlackMessenger;
use tlb_sqlite::SqlitePairStore;

/// A started bot.
struct Running {
    pipeline: Pipeline,
    notifier: Notifier,
    listener: JoinHandle<()>,
}

impl Running {
    /// Stop taking Slack events, finish the queued ones and deliver every
    /// pending message.
    async fn stop(self) {
        self.listener.abort();
        let _ = self.listener.await;
        if let Some(registry) = self.pipeline.shutdown().await {
            info!(pairs = registry.len(), "pipeline drained");
        }
        self.notifier.flush().await;
    }
}

struct App {
    cfg: Arc<Config>,
    running: Mutex<Option<Running>>,
}

impl App {
    /// Start the bot once; later calls return immediately. A failed start
    /// leaves nothing behind so the next trigger tries again.
    async fn ensure_started(&self) -> anyhow::Result<()> {
        let mut running = self.running.lock().await;
        if running.is_none() {
            *running = Some(start(&self.cfg).await?);
        }
        Ok(())
    }

    async fn stop(&self) {
        if let Some(running) = self.running.lock().await.take() {
            running.stop().await;
            info!("twin lunch bot stopped");
        }
    }
}

async fn start(cfg: &Config) -> anyhow::Result<Running> {
    info!(admins = cfg.admins.len(), "starting twin lunch bot");

    let secrets: Box<dyn SecretSource> = match cfg.secret_backend {
        SecretBackend::Env => Box::new(EnvSecretSource),
        SecretBackend::Gcp => {
            let project = cfg
                .gcp_project
                .clone()
                .context("GOOGLE_CLOUD_PROJECT is required for the gcp secret source")?;
            Box::new(GcpSecretManager::new(project)?)
        }
    };
    let creds = SlackCredentials::load(secrets.as_ref())
        .await
        .context("error reading slack secrets")?;

    let slack = SlackMessenger::connect(&creds.bot_token)?;
    slack
        .authenticate()
        .await
        .context("slack authentication failed")?;
    let client = slack.client();
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        Arc::new(slack),
        ThrottleConfig::default(),
    ));

    let store: Arc<dyn PairStore> = match cfg.store_backend {
        StoreBackend::Sqlite => Arc::new(
            SqlitePairStore::connect(&cfg.database_url, cfg.pair_list_key.clone())
                .await
                .context("error connecting to the twin lunch store")?,
        ),
        StoreBackend::Memory => Arc::new(MemoryPairStore::new()),
    };
    let registry = PairingRegistry::load(store)
        .await
        .context("error loading twin lunches")?;

    let notifier = Notifier::new(messenger, cfg.send_delay);
    let pipeline = Pipeline::spawn(
        registry,
        CommandInterpreter::new(cfg.admins.clone(), notifier.clone()),
        router::Router::new(notifier.clone()),
        cfg.channel_capacity,
    );

    let events = pipeline.events();
    let listener = tokio::spawn(async move {
        if let Err(e) = tlb_slack::socket::run_socket_mode(client, &creds.app_token, events).await {
            error!(error = %e, "slack socket mode failed");
        }
    });

    info!("twin lunch bot started");
    Ok(Running {
        pipeline,
        notifier,
        listener,
    })
}

async fn warmup(State(app): State<Arc<App>>) -> (StatusCode, &'static str) {
    match app.ensure_started().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            error!(error = ?e, "startup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "startup failed")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(Config::load()?);
    tlb_core::logging::init("tlb", cfg.debug)?;

    let app = Arc::new(App {
        cfg: cfg.clone(),
        running: Mutex::new(None),
    });

    if cfg.start_on_boot {
        app.ensure_started().await?;
    }

    let routes = Router::new()
        .route("/_ah/warmup", get(warmup))
        .with_state(app.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port))
        .await
        .with_context(|| format!("failed to bind port {}", cfg.port))?;
    info!(port = cfg.port, "listening for warmup requests");

    axum::serve(listener, routes)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app.stop().await;
    Ok(())
}
