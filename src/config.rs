//! JSON runtime configuration for the demo binary and host applications.

use crate::DetectorParams;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Write the full detection report here as JSON.
    pub json_out: Option<PathBuf>,
}

#[derive(Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Input cloud, whitespace-separated `x y z [h]` rows.
    pub input_path: PathBuf,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub detector_params: DetectorParams,
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: RuntimeConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_default_params() {
        let json = r#"{ "input_path": "plot.xyz" }"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.input_path, PathBuf::from("plot.xyz"));
        assert!(config.output.json_out.is_none());
        assert!(config.detector_params.validate().is_ok());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let json = r#"{
            "input_path": "plot.xyz",
            "detector_params": {
                "stripe": { "lower_height": 1.0 }
            }
        }"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.detector_params.stripe.lower_height, 1.0);
        assert_eq!(config.detector_params.stripe.upper_height, 3.5);
    }
}
