use anyhow::Result;
use knest_models::VersionInfo;
use knest_orchestrations::names::{VIRTINK_PROVIDER_VERSION, VIRTINK_VERSION};

pub fn version_info() -> VersionInfo {
    VersionInfo {
        knest: env!("CARGO_PKG_VERSION").to_string(),
        virtink: VIRTINK_VERSION.to_string(),
        cluster_api_provider_virtink: VIRTINK_PROVIDER_VERSION.to_string(),
    }
}

fn render(info: &VersionInfo, output: Option<&str>) -> Result<String> {
    match output {
        None | Some("") => Ok(format!(
            "knest version: {:?}, Virtink version: {:?}, cluster-api-provider-virtink version: {:?}",
            info.knest, info.virtink, info.cluster_api_provider_virtink
        )),
        Some("json") => Ok(serde_json::to_string_pretty(info)?),
        Some(other) => anyhow::bail!("unsupported output format: {}", other),
    }
}

pub fn run_version(output: Option<String>) -> Result<()> {
    println!("{}", render(&version_info(), output.as_deref())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_output() {
        let text = render(&version_info(), None).unwrap();
        assert!(text.contains("Virtink version: \"v0.13.0\""));
        assert!(text.contains("cluster-api-provider-virtink version: \"v0.6.0\""));
    }

    #[test]
    fn test_json_output() {
        let json = render(&version_info(), Some("json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["virtink"], "v0.13.0");
        assert_eq!(value["cluster-api-provider-virtink"], "v0.6.0");
    }

    #[test]
    fn test_unknown_format() {
        let err = render(&version_info(), Some("yaml")).unwrap_err();
        assert_eq!(err.to_string(), "unsupported output format: yaml");
    }
}
