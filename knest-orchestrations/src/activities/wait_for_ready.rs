//! Blocking readiness and deletion waits
//!
//! Waits have no deadline. A wait ends when the condition holds, when the
//! control plane returns an error, or when the cancellation token fires
//! (Ctrl-C in the CLI, a short-lived token in tests).

use std::time::Duration;

use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::k8s_client::{ControlPlane, ResourceRef};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ReadinessWaiter {
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl ReadinessWaiter {
    pub fn new(poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            poll_interval,
            cancel,
        }
    }

    /// Fails once the token has fired, so no further side effects start
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Block until `resource` reports `condition` as `"True"`. A resource that
    /// does not exist yet is waited for, not treated as an error.
    pub async fn wait_for_condition(
        &self,
        control_plane: &dyn ControlPlane,
        resource: &ResourceRef,
        condition: &str,
    ) -> Result<()> {
        info!(resource = %resource, condition = %condition, "waiting for condition");
        loop {
            match control_plane.get(resource).await {
                Ok(Some(obj)) if condition_is_true(&obj, condition) => {
                    debug!(resource = %resource, condition = %condition, "condition met");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => return Err(Error::wait(resource, e)),
            }
            self.pause(resource).await?;
        }
    }

    /// Block until `resource` no longer exists
    pub async fn wait_for_deletion(
        &self,
        control_plane: &dyn ControlPlane,
        resource: &ResourceRef,
    ) -> Result<()> {
        info!(resource = %resource, "waiting for deletion");
        loop {
            match control_plane.get(resource).await {
                Ok(None) => return Ok(()),
                Ok(Some(_)) => {}
                Err(e) => return Err(Error::wait(resource, e)),
            }
            self.pause(resource).await?;
        }
    }

    async fn pause(&self, resource: &ResourceRef) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::wait(resource, "cancelled")),
            _ = tokio::time::sleep(self.poll_interval) => Ok(()),
        }
    }
}

impl Default for ReadinessWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, CancellationToken::new())
    }
}

/// `status.conditions[type == condition].status == "True"`
pub fn condition_is_true(obj: &DynamicObject, condition: &str) -> bool {
    obj.data
        .pointer("/status/conditions")
        .and_then(|c| c.as_array())
        .map(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(|t| t.as_str()) == Some(condition)
                    && c.get("status").and_then(|s| s.as_str()) == Some("True")
            })
        })
        .unwrap_or(false)
}
