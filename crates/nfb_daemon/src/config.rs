use std::path::Path;

use anyhow::{Context, Result};
use nfb_protocol::Settings;

/// Loads a session's `Settings` tree from a YAML file, the same crate and
/// pattern the reference daemon uses for its own pipeline config.
pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings file '{}'", path.display()))?;
    let settings: Settings = serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing settings file '{}'", path.display()))?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_yaml_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "experiment_name: demo\n\
             acquisition:\n  sample_rate: 250.0\n  n_channels: 1\n  inlet:\n    type: Mock\n    seed: 1\n\
             channels: [Cz]\n\
             signals: []\n\
             protocols: []\n\
             groups: []\n"
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.experiment_name, "demo");
        assert_eq!(settings.channels, vec!["Cz".to_string()]);
    }

    #[test]
    fn missing_file_is_reported_with_context() {
        let err = load_settings("/nonexistent/settings.yaml").unwrap_err();
        assert!(err.to_string().contains("reading settings file"));
    }
}
