// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking and manifest generation

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::{API_GROUP, API_VERSION};
use crate::error::{Result, StrataError};
use crate::types::{CNSet, DNSet, LogSet, StrataCluster};
use kube::{discovery::Discovery, Client, CustomResourceExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Kinds the operator serves
pub const KINDS: [&str; 4] = ["LogSet", "DNSet", "CNSet", "StrataCluster"];

/// Wait for all strata CRDs to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match missing_kinds(client).await {
            Ok(missing) if missing.is_empty() => {
                info!("CRDs ({}/{}) are available", API_GROUP, API_VERSION);
                return Ok(());
            }
            Ok(missing) => {
                info!(
                    "CRDs not yet available: {}, waiting {} seconds...",
                    missing.join(", "),
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for CRDs: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn missing_kinds(client: &Client) -> Result<Vec<&'static str>> {
    let discovery = Discovery::new(client.clone())
        .filter(&[API_GROUP])
        .run()
        .await?;

    let mut served = Vec::new();
    for group in discovery.groups() {
        if group.name() == API_GROUP {
            for (ar, _) in group.recommended_resources() {
                if ar.version == API_VERSION {
                    served.push(ar.kind);
                }
            }
        }
    }

    Ok(KINDS
        .into_iter()
        .filter(|kind| !served.iter().any(|s| s == kind))
        .collect())
}

/// All CRDs as a multi-document YAML stream
pub fn crd_manifests() -> Result<String> {
    let crds = [LogSet::crd(), DNSet::crd(), CNSet::crd(), StrataCluster::crd()];
    let mut out = String::new();
    for crd in crds {
        let yaml = serde_yaml::to_string(&crd)
            .map_err(|e| StrataError::ConfigError(format!("cannot render CRD: {}", e)))?;
        out.push_str("---\n");
        out.push_str(&yaml);
    }
    Ok(out)
}
