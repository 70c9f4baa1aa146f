//! Capability probe: is a marker resource present on the host?

use tracing::debug;

use crate::error::Result;
use crate::k8s_client::{ControlPlane, ResourceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    pub fn is_present(self) -> bool {
        self == Presence::Present
    }
}

/// Not-found is [`Presence::Absent`]; transport failures propagate.
pub async fn probe(control_plane: &dyn ControlPlane, marker: &ResourceRef) -> Result<Presence> {
    let presence = if control_plane.exists(marker).await? {
        Presence::Present
    } else {
        Presence::Absent
    };
    debug!(marker = %marker, ?presence, "probed");
    Ok(presence)
}
