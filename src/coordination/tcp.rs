// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{CoordinationClient, Connector};
use crate::error::{Result, StrataError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Opens a plain TCP session to the coordination service's discovery address
#[derive(Debug, Default, Clone)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        discovery_address: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn CoordinationClient>> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(discovery_address))
            .await
            .map_err(|_| {
                StrataError::Timeout(format!(
                    "connecting to coordination service at {}",
                    discovery_address
                ))
            })?
            .map_err(|e| {
                StrataError::CoordinationError(format!(
                    "failed to connect to {}: {}",
                    discovery_address, e
                ))
            })?;

        debug!("Connected to coordination service at {}", discovery_address);
        Ok(Arc::new(TcpClient {
            address: discovery_address.to_string(),
            stream: Mutex::new(Some(stream)),
        }))
    }
}

struct TcpClient {
    address: String,
    stream: Mutex<Option<TcpStream>>,
}

#[async_trait]
impl CoordinationClient for TcpClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn close(&self) -> Result<()> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.shutdown().await.map_err(|e| {
            StrataError::CoordinationError(format!("failed to close {}: {}", self.address, e))
        })
    }
}
