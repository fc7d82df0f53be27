// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Connections to the coordination service hosted by the log tier.

pub mod manager;
pub mod tcp;

pub use manager::{evict_reason, ClientManager, EvictReason};
pub use tcp::TcpConnector;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// An established session with a coordination service
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Address the session was opened against
    fn address(&self) -> &str;

    async fn close(&self) -> Result<()>;
}

/// Opens coordination sessions
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        discovery_address: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn CoordinationClient>>;
}
