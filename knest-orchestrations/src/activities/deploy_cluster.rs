//! Stage and apply the final cluster manifest

use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use tracing::info;

use crate::error::Result;
use crate::k8s_client::{join_documents, ControlPlane};

/// Final manifest written to a scratch directory, removed on drop
#[derive(Debug)]
pub struct StagedManifest {
    _dir: TempDir,
    path: PathBuf,
}

impl StagedManifest {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn stage_manifest(documents: &[Value]) -> Result<StagedManifest> {
    let dir = tempfile::Builder::new().prefix("knest").tempdir()?;
    let path = dir.path().join("cluster-template.yaml");
    std::fs::write(&path, join_documents(documents)?)?;
    Ok(StagedManifest { _dir: dir, path })
}

/// Apply every document in order
pub async fn deploy_documents(control_plane: &dyn ControlPlane, documents: &[Value]) -> Result<usize> {
    for document in documents {
        control_plane.apply(document).await?;
    }
    info!(documents = documents.len(), "created cluster resources");
    Ok(documents.len())
}
