use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use waterius::api::{Endpoints, HttpTransport, WateriusApi};
use waterius::config::Config;
use waterius::coordinator::Coordinator;
use waterius::presentation::{EntityContext, EntityRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    waterius::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!(
        "Waterius {} starting for '{}' ({})",
        env!("APP_VERSION"),
        config.name,
        config.unique_id()
    );

    let transport = HttpTransport::new(&config.token)?;
    let api = WateriusApi::new(
        Arc::new(transport),
        Endpoints::new(&config.api.base_url),
        config.request_timeout(),
    );
    let entry_id = config.unique_id();
    let mut coordinator = Coordinator::new(api, config.update_interval(), &entry_id);

    // Entities are registered from the first snapshot; without it we are not ready.
    let first = coordinator
        .first_refresh()
        .await
        .map_err(|e| anyhow::anyhow!("Initial refresh failed: {}", e))?;

    let handle = coordinator.handle();
    let ctx = EntityContext::new(&entry_id, handle.clone());
    let registry = Arc::new(EntityRegistry::build(&ctx, &first));
    info!("Registered {} entities", registry.entities().len());

    #[cfg(feature = "web")]
    let web_task = {
        let state = waterius::web::AppState {
            coordinator: handle.clone(),
            entities: registry.clone(),
            config: Arc::new(tokio::sync::Mutex::new(config.clone())),
        };
        let host = config.web.host.clone();
        let port = config.web.port;
        tokio::spawn(async move {
            if let Err(e) = waterius::web::serve(state, &host, port).await {
                error!("{}", e);
            }
        })
    };
    #[cfg(not(feature = "web"))]
    let _ = registry;

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            let _ = shutdown_handle.shutdown();
        }
    });

    let result = coordinator.run().await;

    #[cfg(feature = "web")]
    web_task.abort();

    match result {
        Ok(()) => {
            info!("Coordinator shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Coordinator failed with error: {}", e);
            Err(anyhow::anyhow!("Coordinator error: {}", e))
        }
    }
}
