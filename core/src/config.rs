use std::{fs, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::nsd::HemisphereSelection;

/// Immutable training-run configuration.
///
/// Validated once at construction; nothing downstream re-checks fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub latent_dim: usize,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub roi_class: String,
    pub hem: HemisphereSelection,
    pub ds: String,
    pub sparsity: f64,
    pub l1: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            latent_dim: 30,
            batch_size: 30,
            num_epochs: 15,
            roi_class: "floc-bodies".to_string(),
            hem: HemisphereSelection::All,
            ds: "fmri".to_string(),
            sparsity: 0.8,
            l1: 0.1,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        if self.latent_dim == 0 {
            bail!("latent_dim must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.num_epochs == 0 {
            bail!("num_epochs must be at least 1");
        }
        if self.roi_class.is_empty() {
            bail!("roi_class must not be empty");
        }
        if self.ds != "fmri" {
            bail!("unsupported dataset selector: {:?}", self.ds);
        }
        if !(0.0..=1.0).contains(&self.sparsity) {
            bail!("sparsity must lie in [0, 1], got {}", self.sparsity);
        }
        if self.l1 < 0.0 {
            bail!("l1 must be non-negative, got {}", self.l1);
        }
        Ok(())
    }

    /// Results directory derived from the run parameters, so runs with
    /// different settings never overwrite each other.
    pub fn results_dir(&self) -> PathBuf {
        PathBuf::from(format!(
            "results/{}_latent{}_sparsity{}_bs{}_l1{}",
            self.ds, self.latent_dim, self.sparsity, self.batch_size, self.l1
        ))
    }
}

/// Load a JSON configuration from disk, creating it with the provided
/// initializer if missing.
pub fn load_or_init<T, F>(path: &Path, initializer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        Ok(value)
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let value = initializer();
        let serialized = serde_json::to_string_pretty(&value)?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        TrainConfig::default().validate().unwrap();
    }

    #[test]
    fn results_dir_encodes_run_parameters() {
        let config = TrainConfig::default();
        assert_eq!(
            config.results_dir(),
            PathBuf::from("results/fmri_latent30_sparsity0.8_bs30_l10.1")
        );
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut config = TrainConfig::default();
        config.learning_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.sparsity = 1.5;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.ds = "cifar10".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn hemisphere_round_trips_through_json() {
        let config = TrainConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"hem\":\"all\""));
        let parsed: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.hem, HemisphereSelection::All);
    }

    #[test]
    fn load_or_init_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let written: TrainConfig = load_or_init(&path, TrainConfig::default).unwrap();
        let mut changed = written.clone();
        changed.latent_dim = 64;
        // Second load must return the stored value, not the initializer's.
        let reloaded: TrainConfig = load_or_init(&path, || changed).unwrap();
        assert_eq!(reloaded.latent_dim, written.latent_dim);
    }
}
