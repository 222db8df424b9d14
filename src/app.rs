use crate::{
    catalog::Catalog,
    cli, context, rest,
    storage::{SqliteStorage, Storage},
};
use anyhow::{Context as AnyhowContext, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The main application state.
/// decoupled from CLI parsing to allow for easier testing.
pub struct App<S: Storage = SqliteStorage> {
    config: context::Context,
    catalog: Catalog<S>,
    shutdown: CancellationToken,
}

impl App {
    /// Builds the App from CLI arguments: log file, data dir and schema setup
    /// all happen here.
    pub fn from_cli() -> Result<(App<SqliteStorage>, cli::Cli)> {
        let cli = crate::cli::parse();
        let ctx = context::Context::from_cli(&cli);

        crate::tracing::set_log_file(ctx.log_file.as_deref()).context("opening log file")?;
        log_startup_info(&ctx);

        let storage = init_storage(&ctx)?;
        let catalog = Catalog::new(storage).with_options(ctx.catalog_options);

        Ok((App::new(ctx, catalog), cli))
    }
}

impl<S: Storage + Clone + Send + Sync + 'static> App<S> {
    fn new(config: context::Context, catalog: Catalog<S>) -> Self {
        Self {
            config,
            catalog,
            shutdown: CancellationToken::new(),
        }
    }

    /// Main entry point for the daemon.
    pub async fn run_daemon(&self) -> Result<()> {
        self.log_runtime_config();

        let mut rest_handle = self.spawn_rest_server();
        self.wait_for_shutdown(&mut rest_handle).await
    }

    fn spawn_rest_server(&self) -> JoinHandle<()> {
        let addr = self.config.api_listen;
        let catalog = self.catalog.clone();
        let token = self.shutdown.clone();

        tokio::spawn(async move {
            if let Err(e) = rest::serve(addr, catalog, token).await {
                log::error!("REST server failed: {:#}", e);
            }
        })
    }

    async fn wait_for_shutdown(&self, rest_task: &mut JoinHandle<()>) -> Result<()> {
        let stopped_early = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("🧨 Ctrl-C received, shutting down...");
                false
            }
            _ = &mut *rest_task => {
                log::error!("REST task exited unexpectedly");
                true
            }
        };

        self.shutdown.cancel();

        // Polling a completed JoinHandle again panics.
        if !rest_task.is_finished() {
            let _ = rest_task.await;
        }

        if stopped_early {
            anyhow::bail!("REST server stopped unexpectedly");
        }
        log::info!("✅ Shutdown complete");
        Ok(())
    }

    fn log_runtime_config(&self) {
        log::info!("🌐 REST API: http://{}", self.config.api_listen);
        log::info!("⏱️ Busy timeout: {:?}", self.config.busy_timeout);
        log::info!(
            "🏷️ Attribute category check: {}",
            if self.config.catalog_options.enforce_attribute_category {
                "enforced"
            } else {
                "off"
            }
        );
        if let Some(path) = self.config.log_file.as_deref() {
            log::info!("📝 Log file: {}", path.to_string_lossy());
        }
    }
}

// --- Standalone Helpers ---

fn log_startup_info(ctx: &context::Context) {
    log::info!("🚀 Starting pmt");
    log::info!("📂 Data dir: {}", ctx.data_dir.to_string_lossy());
}

fn init_storage(ctx: &context::Context) -> Result<SqliteStorage> {
    std::fs::create_dir_all(&ctx.data_dir)
        .with_context(|| format!("creating data dir {}", ctx.data_dir.to_string_lossy()))?;

    let sqlite = SqliteStorage::new(ctx.db_path()).with_busy_timeout(ctx.busy_timeout);
    if ctx.reset {
        sqlite.reset_all().context("resetting storage")?;
    }
    sqlite.init().context("initializing storage")?;

    Ok(sqlite)
}

// --- Entry Point ---

pub async fn run() -> Result<()> {
    let (app, cli) = App::from_cli()?;

    // One-shot commands
    if let Some(cmd) = cli.cmd {
        let catalog = app.catalog.clone();
        return tokio::task::spawn_blocking(move || cmd.run(&catalog)).await?;
    }

    app.run_daemon().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogOptions;
    use std::{path::Path, time::Duration};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn make_context(data_dir: &Path, port: u16) -> context::Context {
        context::Context {
            data_dir: data_dir.to_path_buf(),
            reset: false,
            log_file: None,
            api_listen: format!("127.0.0.1:{}", port).parse().unwrap(),
            busy_timeout: Duration::from_millis(500),
            catalog_options: CatalogOptions::default(),
        }
    }

    fn make_app(data_dir: &Path, port: u16) -> App<SqliteStorage> {
        let ctx = make_context(data_dir, port);
        let storage = init_storage(&ctx).unwrap();
        App::new(ctx, Catalog::new(storage))
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn init_storage_creates_data_dir_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let mut ctx = make_context(&data_dir, 0);

        let catalog = Catalog::new(init_storage(&ctx).unwrap());
        catalog.create_category("Shoes").unwrap();
        assert!(ctx.db_path().exists());

        let catalog = Catalog::new(init_storage(&ctx).unwrap());
        assert_eq!(catalog.list_categories().unwrap().len(), 1);

        ctx.reset = true;
        let catalog = Catalog::new(init_storage(&ctx).unwrap());
        assert!(catalog.list_categories().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wait_for_shutdown_reports_early_exit() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path(), 0);

        let mut rest_task = tokio::spawn(async {});

        let res = app.wait_for_shutdown(&mut rest_task).await;
        assert!(res.is_err());
        assert!(app.shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn spawn_rest_server_starts_and_serves_categories() {
        let dir = tempfile::tempdir().unwrap();
        let port = free_port();
        let app = make_app(dir.path(), port);
        app.catalog.create_category("Shoes").unwrap();

        let handle = app.spawn_rest_server();

        // Give it a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(
            !handle.is_finished(),
            "REST server task finished unexpectedly (likely bind failed)"
        );

        let mut stream = tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
            .await
            .expect("connect to REST server");
        stream
            .write_all(b"GET /categories HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await.unwrap();
        let response = String::from_utf8_lossy(&buffer);

        assert!(response.contains("200 OK"));
        assert!(response.contains("\"name\":\"Shoes\""));

        app.shutdown.cancel();
        let _ = handle.await;
    }
}
