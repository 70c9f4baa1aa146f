use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Where nested cluster kubeconfigs are written
    pub kube_dir: PathBuf,
    /// clusterctl provider registry file
    pub clusterctl_config: PathBuf,
    pub poll_interval: Duration,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;

        let path_or = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        let poll_interval_secs: u64 = lookup("KNEST_POLL_INTERVAL_SECS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .context("KNEST_POLL_INTERVAL_SECS must be a whole number of seconds")?;

        Ok(Self {
            kube_dir: path_or("KNEST_KUBE_DIR", home.join(".kube")),
            clusterctl_config: path_or(
                "KNEST_CLUSTERCTL_CONFIG",
                home.join(".cluster-api").join("clusterctl.yaml"),
            ),
            poll_interval: Duration::from_secs(poll_interval_secs),
            log_dir: path_or("KNEST_LOG_DIR", home.join(".knest")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_live_under_home() {
        let config = load(&[]).unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(config.kube_dir, home.join(".kube"));
        assert_eq!(config.clusterctl_config, home.join(".cluster-api/clusterctl.yaml"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.log_dir, home.join(".knest"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[("KNEST_KUBE_DIR", "/tmp/kube"), ("KNEST_POLL_INTERVAL_SECS", "1")]).unwrap();
        assert_eq!(config.kube_dir, PathBuf::from("/tmp/kube"));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_bad_poll_interval() {
        let err = load(&[("KNEST_POLL_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("KNEST_POLL_INTERVAL_SECS"));
    }
}
