// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::runtime::Controller;
use kube::Client;
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use strata::config::Config;
use strata::coordination::{ClientManager, TcpConnector};
use strata::engine::controller::{owns, scoped_api};
use strata::engine::{run_controller, Engine, Managed};
use strata::kubernetes::{crd_manifests, wait_for_crds};
use strata::reconcilers::{CNSetActor, ClusterActor, DNSetActor, LogSetActor};
use strata::store::KubeStore;
use strata::types::{CNSet, DNSet, LogSet, StrataCluster};

/// A controller for a tier kind, woken by changes to its sub-resources
fn tier_controller<K: Managed>(client: &Client, config: &Config) -> Controller<K> {
    let controller = Controller::new(scoped_api::<K>(client, config), WatcherConfig::default());
    let controller = owns::<K, Service>(controller, client, config);
    let controller = owns::<K, ConfigMap>(controller, client, config);
    owns::<K, StatefulSet>(controller, client, config)
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().nth(1).as_deref() == Some("crd") {
        print!("{}", crd_manifests()?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting strata operator");

    let config = Arc::new(Config::from_env()?);
    info!(
        "Configuration loaded: watch_namespace={}, resync_interval={:?}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.resync_interval
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for strata CRDs to become available...");
    wait_for_crds(&client).await?;

    let store = KubeStore::new(client.clone());
    let clients = Arc::new(ClientManager::new(
        store.clone(),
        Arc::new(TcpConnector),
        config.connect_timeout,
    ));
    let sweeper = clients.spawn_sweeper(config.client_sweep_interval);

    let cluster_controller = Controller::new(
        scoped_api::<StrataCluster>(&client, &config),
        WatcherConfig::default(),
    );
    let cluster_controller = owns::<StrataCluster, LogSet>(cluster_controller, &client, &config);
    let cluster_controller = owns::<StrataCluster, DNSet>(cluster_controller, &client, &config);
    let cluster_controller = owns::<StrataCluster, CNSet>(cluster_controller, &client, &config);

    info!("Starting controllers...");

    let result = tokio::try_join!(
        run_controller(
            Engine::new(store.clone(), ClusterActor, config.clone()),
            cluster_controller
        ),
        run_controller(
            Engine::new(store.clone(), LogSetActor::new(clients.clone()), config.clone()),
            tier_controller::<LogSet>(&client, &config)
        ),
        run_controller(
            Engine::new(store.clone(), DNSetActor, config.clone()),
            tier_controller::<DNSet>(&client, &config)
        ),
        run_controller(
            Engine::new(store.clone(), CNSetActor, config.clone()),
            tier_controller::<CNSet>(&client, &config)
        ),
    );

    info!("Controllers stopped, shutting down client sweeper");
    clients.shutdown();
    sweeper.await?;

    result?;
    Ok(())
}
