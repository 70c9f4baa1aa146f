//! Error types for knest orchestrations

use std::fmt;

use knest_models::ModelError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a single provisioning step
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The host control plane could not be reached or refused the request
    #[error("control plane request failed: {0}")]
    Transport(String),

    /// Installing a component onto the host cluster failed
    #[error("install {component}: {message}")]
    Install { component: String, message: String },

    /// The readiness poll for a resource errored or was cancelled
    #[error("wait for {resource}: {message}")]
    Wait { resource: String, message: String },

    /// Caller input rejected before any side effect
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// An external program exited unsuccessfully
    #[error("run command {command:?}: {message}")]
    Command { command: String, message: String },

    /// A remote or local manifest could not be read
    #[error("fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// The run was interrupted before this step started
    #[error("interrupted")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Local or remote payload could not be decoded
    #[error("decode {what}: {message}")]
    Decode { what: String, message: String },
}

impl Error {
    pub fn transport(message: impl fmt::Display) -> Self {
        Error::Transport(message.to_string())
    }

    pub fn install(component: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Install {
            component: component.into(),
            message: message.to_string(),
        }
    }

    pub fn wait(resource: impl fmt::Display, message: impl fmt::Display) -> Self {
        Error::Wait {
            resource: resource.to_string(),
            message: message.to_string(),
        }
    }

    pub fn template(message: impl fmt::Display) -> Self {
        Error::Template(message.to_string())
    }

    pub fn decode(what: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnsupportedCni(_) => Error::UnsupportedMode(err.to_string()),
            other => Error::InvalidInput(other.to_string()),
        }
    }
}

impl From<tera::Error> for Error {
    fn from(err: tera::Error) -> Self {
        // tera keeps the useful part ("Variable `X` not found") in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Error::Template(message)
    }
}

/// Named stages of the create pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    EnsureRegistryEntry,
    InstallLadder,
    EnsureNamespace,
    AllocateAddressPool,
    GenerateManifest,
    ApplyOverlay,
    Apply,
    WaitControlPlaneInitialized,
    ExtractEndpoint,
    PersistCredential,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Step::Validate => "validate input",
            Step::EnsureRegistryEntry => "setup clusterctl config",
            Step::InstallLadder => "install host components",
            Step::EnsureNamespace => "ensure target namespace",
            Step::AllocateAddressPool => "allocate IP pool",
            Step::GenerateManifest => "generate cluster template",
            Step::ApplyOverlay => "apply cluster template overlay",
            Step::Apply => "create cluster resources",
            Step::WaitControlPlaneInitialized => "wait for control plane to be initialized",
            Step::ExtractEndpoint => "extract cluster endpoint",
            Step::PersistCredential => "save kubeconfig",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An [`Error`] tagged with the pipeline step that raised it
#[derive(Debug, thiserror::Error)]
#[error("{step}: {source}")]
pub struct ProvisionError {
    pub step: Step,
    #[source]
    pub source: Error,
}

/// Attach a [`Step`] to a step result
pub trait StepContext<T> {
    fn step(self, step: Step) -> std::result::Result<T, ProvisionError>;
}

impl<T> StepContext<T> for Result<T> {
    fn step(self, step: Step) -> std::result::Result<T, ProvisionError> {
        self.map_err(|source| ProvisionError { step, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_context_prefixes_message() {
        let result: Result<()> = Err(Error::InvalidInput("bad token".to_string()));
        let err = result.step(Step::AllocateAddressPool).unwrap_err();
        assert_eq!(err.to_string(), "allocate IP pool: invalid input: bad token");
        assert_eq!(err.step, Step::AllocateAddressPool);
    }

    #[test]
    fn test_model_errors_map_to_kinds() {
        let err: Error = ModelError::UnsupportedCni("flannel".to_string()).into();
        assert!(matches!(err, Error::UnsupportedMode(_)));

        let err: Error = ModelError::InvalidAddress("a-b-c".to_string()).into();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
