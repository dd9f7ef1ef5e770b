use anyhow::Result;
use clap::Parser;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use kube::{Api, Client, Resource};
use kube_runtime::{watcher, WatchStreamExt};
use router_bgp::{Announcement, ExternalIpRouteTable};
use router_core::{ControllerMetrics, ExternalServicesController, Informer, ResourceEventHandler};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod config;
mod server;

use config::Config;
use server::ServerState;

pub(crate) type RouteController = ExternalServicesController<ExternalIpRouteTable>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config::init_logging(config.log_format);

    info!("Starting router-controller...");

    let controller_config = config.controller_config();
    controller_config.validate()?;

    let client = Client::try_default().await?;
    let metrics = ControllerMetrics::new()?;
    let table = Arc::new(ExternalIpRouteTable::new().with_metrics(metrics.clone()));
    let controller = Arc::new(
        ExternalServicesController::new(controller_config, table.clone()).with_metrics(metrics.clone()),
    );

    let shutdown = CancellationToken::new();
    let mut tasks = vec![
        spawn_informer::<Pod>(
            Api::namespaced(client.clone(), &config.proxy_namespace),
            controller.clone(),
            shutdown.clone(),
        ),
        spawn_informer::<Service>(Api::all(client.clone()), controller.clone(), shutdown.clone()),
        spawn_informer::<Endpoints>(Api::all(client), controller.clone(), shutdown.clone()),
        tokio::spawn(log_announcements(table.subscribe(), shutdown.clone())),
    ];

    {
        let controller = controller.clone();
        let shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move { controller.run(shutdown).await }));
    }

    {
        let state = Arc::new(ServerState {
            metrics,
            table,
            controller,
        });
        let shutdown = shutdown.clone();
        let addr = config.metrics_addr;
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server::serve(addr, state, shutdown.clone()).await {
                error!("Metrics server error: {}", e);
                shutdown.cancel();
            }
        }));
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, exiting...");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            error!("Task failed: {}", e);
        }
    }

    Ok(())
}

fn spawn_informer<K>(api: Api<K>, controller: Arc<RouteController>, shutdown: CancellationToken) -> JoinHandle<()>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    RouteController: ResourceEventHandler<K>,
{
    tokio::spawn(async move {
        let stream = watcher(api, watcher::Config::default()).default_backoff();
        Informer::<K>::new()
            .run(stream, controller.as_ref(), shutdown)
            .await;
    })
}

async fn log_announcements(mut announcements: watch::Receiver<Vec<Announcement>>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = announcements.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = announcements.borrow_and_update().clone();
                let prefixes: Vec<String> = current.iter().map(|a| a.to_string()).collect();
                info!(count = prefixes.len(), announcements = ?prefixes, "Announcing prefixes");
            }
        }
    }
}
