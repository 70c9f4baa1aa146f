//! Overlay composition for persistent clusters
//!
//! An overlay fragment is a YAML list of `{target: {kind, name?}, patch}`
//! entries. Each patch is merged (RFC 7386) into every base document whose
//! kind, and name when given, match the target.

use knest_models::{HostCni, MachineMode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::k8s_client::DocumentMeta;

const CALICO_OVERLAY: &str = include_str!("../templates/overlays/calico-static-ip-and-mac.yaml");
const KUBE_OVN_OVERLAY: &str = include_str!("../templates/overlays/kube-ovn-static-ip-and-mac.yaml");

/// Overlay applied on top of the generated cluster manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Calico,
    KubeOvn,
}

impl Overlay {
    /// Pick the overlay for a mode and optional host CNI. Ephemeral machines
    /// never get an overlay, so the CNI is only checked for persistent ones.
    pub fn select(mode: MachineMode, host_cni: Option<&str>) -> Result<Self> {
        if mode == MachineMode::Ephemeral {
            return Ok(Overlay::None);
        }
        Ok(match host_cni.map(str::parse::<HostCni>).transpose()? {
            Some(HostCni::Calico) => Overlay::Calico,
            Some(HostCni::KubeOvn) => Overlay::KubeOvn,
            None => Overlay::None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Overlay::None => "none",
            Overlay::Calico => "calico-static-ip-and-mac",
            Overlay::KubeOvn => "kube-ovn-static-ip-and-mac",
        }
    }

    fn source(self) -> Option<&'static str> {
        match self {
            Overlay::None => None,
            Overlay::Calico => Some(CALICO_OVERLAY),
            Overlay::KubeOvn => Some(KUBE_OVN_OVERLAY),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OverlayTarget {
    kind: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OverlayEntry {
    target: OverlayTarget,
    patch: Value,
}

impl OverlayTarget {
    fn matches(&self, meta: &DocumentMeta) -> bool {
        self.kind == meta.kind && self.name.as_ref().map_or(true, |n| *n == meta.name)
    }
}

fn parse_fragment(overlay: Overlay, source: &str) -> Result<Vec<OverlayEntry>> {
    serde_yaml::from_str(source)
        .map_err(|e| Error::template(format!("overlay {}: {}", overlay.name(), e)))
}

/// Merge `patch` into `target` with JSON merge-patch semantics
pub fn merge_patch(target: &mut Value, patch: &Value) {
    json_patch::merge(target, patch);
}

/// Merge the selected overlay into the base documents. Every overlay entry
/// must match at least one document.
pub fn compose(mut documents: Vec<Value>, overlay: Overlay) -> Result<Vec<Value>> {
    let Some(source) = overlay.source() else {
        debug!("no overlay selected");
        return Ok(documents);
    };

    let entries = parse_fragment(overlay, source)?;
    let metas = documents
        .iter()
        .map(DocumentMeta::from_value)
        .collect::<Result<Vec<_>>>()?;

    for entry in &entries {
        let mut matched = 0;
        for (document, meta) in documents.iter_mut().zip(&metas) {
            if entry.target.matches(meta) {
                merge_patch(document, &entry.patch);
                matched += 1;
            }
        }
        if matched == 0 {
            return Err(Error::template(format!(
                "overlay {}: no {} in cluster template",
                overlay.name(),
                entry.target.kind
            )));
        }
        debug!(overlay = overlay.name(), kind = %entry.target.kind, matched, "patched documents");
    }

    info!(overlay = overlay.name(), "applied cluster template overlay");
    Ok(documents)
}
