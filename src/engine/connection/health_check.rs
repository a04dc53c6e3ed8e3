//! Health check and connect-and-verify functionality.
//!
//! This module provides health check operations for container engines,
//! including async and sync variants for both standalone health checks
//! and combined connect-and-verify operations.

use std::time::Duration;

use super::{EndpointResolver, EngineClient, HEALTH_CHECK_TIMEOUT_SECS};
use crate::engine::RequestDescriptor;
use crate::error::{TransportError, WireError};

/// Path answered by the daemon's liveness endpoint.
const PING_PATH: &str = "/_ping";

impl EngineClient {
    /// Perform a ping with timeout (internal helper).
    async fn ping_with_timeout(&self) -> Result<(), WireError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);
        let descriptor = RequestDescriptor::get(PING_PATH).header("Accept", "text/plain");

        let outcome = tokio::time::timeout(timeout, self.request_raw(&descriptor))
            .await
            .map_err(|_| TransportError::HealthCheckTimeout {
                seconds: HEALTH_CHECK_TIMEOUT_SECS,
            })?
            .map_err(|error| TransportError::HealthCheckFailed {
                message: error.to_string(),
            })?;
        outcome
            .into_data()
            .map_err(|error| TransportError::HealthCheckFailed {
                message: error.to_string(),
            })?;
        Ok(())
    }

    /// Verify the container engine is responsive (async version).
    ///
    /// Sends a ping request to the engine and waits for a response.
    /// This confirms the engine is operational, not just that the socket
    /// is reachable.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::HealthCheckFailed` if the engine does not
    /// respond correctly.
    ///
    /// Returns `TransportError::HealthCheckTimeout` if the check times out.
    pub async fn health_check_async(&self) -> Result<(), WireError> {
        self.ping_with_timeout().await
    }

    /// Verify the container engine is responsive.
    ///
    /// This is the synchronous version that creates a dedicated tokio runtime
    /// to execute the async health check. Use [`Self::health_check_async`]
    /// when already in an async context.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::RuntimeCreationFailed` if the tokio runtime
    /// cannot be created, plus the errors of [`Self::health_check_async`].
    pub fn health_check(&self) -> Result<(), WireError> {
        let rt = create_runtime()?;
        rt.block_on(self.health_check_async())
    }

    /// Connect to the container engine and verify it responds (async version).
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::connect`] and [`Self::health_check_async`].
    pub async fn connect_and_verify_async(endpoint: &str) -> Result<Self, WireError> {
        let client = Self::connect(endpoint)?;
        client.ping_with_timeout().await?;
        Ok(client)
    }

    /// Connect to the container engine and verify it responds.
    ///
    /// This is the synchronous version that creates a dedicated tokio runtime.
    /// Use [`Self::connect_and_verify_async`] when already in an async context.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::RuntimeCreationFailed` if the tokio runtime
    /// cannot be created, plus the errors of [`Self::connect_and_verify_async`].
    pub fn connect_and_verify(endpoint: &str) -> Result<Self, WireError> {
        let rt = create_runtime()?;
        rt.block_on(Self::connect_and_verify_async(endpoint))
    }

    /// Connect using fallback resolution and verify the engine responds
    /// (async version).
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::connect_with_fallback`] and
    /// [`Self::health_check_async`].
    pub async fn connect_with_fallback_and_verify_async<E: mockable::Env>(
        configured: Option<&str>,
        resolver: &EndpointResolver<'_, E>,
    ) -> Result<Self, WireError> {
        Self::connect_and_verify_async(&resolver.resolve(configured)).await
    }
}

/// Create a tokio runtime for synchronous operations.
fn create_runtime() -> Result<tokio::runtime::Runtime, TransportError> {
    tokio::runtime::Runtime::new().map_err(|e| TransportError::RuntimeCreationFailed {
        message: e.to_string(),
    })
}
