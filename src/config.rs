use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::decomposition::{DEFAULT_MAX_EIGENVALUE, FilterOptions, Reduction};
use crate::metric::{Norm, Vectorized};
use crate::{AppError, AppResult};

/// Metric settings read from `config.json`.
///
/// Every key is optional. `max_eigenvalue` defaults to 1; set it to `null`
/// to keep components of any size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricSettings {
    pub metric: Norm,
    pub p: f64,
    pub num_vecs: Option<usize>,
    pub expl_var: Option<f64>,
    pub abs_min: Option<f64>,
    pub max_eigenvalue: Option<f64>,
}

impl Default for MetricSettings {
    fn default() -> Self {
        Self {
            metric: Norm::Euclidean,
            p: 2.0,
            num_vecs: None,
            expl_var: None,
            abs_min: None,
            max_eigenvalue: Some(DEFAULT_MAX_EIGENVALUE),
        }
    }
}

impl MetricSettings {
    /// Read settings from `explicit`, or from the default location if it exists.
    #[tracing::instrument(name = "Loading settings", level = "debug")]
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        match reddim_dirs::resolve_config_file(explicit)? {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let jd = &mut serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(jd).map_err(|e| {
            error!("Failed to parse settings at path: {}", e.path());
            format!("{} (at `{}`)", e.inner(), e.path())
        })
    }

    pub fn reduction(&self) -> Reduction {
        Reduction::from_criteria(self.num_vecs, self.expl_var, self.abs_min)
    }

    pub fn filter(&self) -> FilterOptions {
        FilterOptions {
            max_eigenvalue: self.max_eigenvalue,
        }
    }

    pub fn vectorized(&self) -> AppResult<Vectorized> {
        Vectorized::new(self.metric, self.p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let settings = MetricSettings::from_json("{}").unwrap();
        assert_eq!(settings, MetricSettings::default());
        assert_eq!(settings.filter().max_eigenvalue, Some(1.0));
        assert_eq!(settings.reduction(), Reduction::All);
    }

    #[test]
    fn null_cap_disables_filtering() {
        let settings = MetricSettings::from_json(
            r#"{"metric": "minkowski", "p": 3, "expl_var": 0.9, "max_eigenvalue": null}"#,
        )
        .unwrap();
        assert_eq!(settings.filter().max_eigenvalue, None);
        assert_eq!(settings.reduction(), Reduction::ExplainedVariance(0.9));
        let vectorized = settings.vectorized().unwrap();
        assert_eq!(vectorized.norm(), Norm::Minkowski);
        assert_eq!(vectorized.p(), 3.0);
    }

    #[test]
    fn errors_name_the_offending_field() {
        let err = MetricSettings::from_json(r#"{"num_vecs": "three"}"#).unwrap_err();
        assert!(err.contains("num_vecs"), "{}", err);

        let err = MetricSettings::from_json(r#"{"nmu_vecs": 3}"#).unwrap_err();
        assert!(err.contains("nmu_vecs"), "{}", err);
    }

    #[test]
    fn explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"metric": "cityblock", "num_vecs": 4}"#).unwrap();
        let settings = MetricSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.metric, Norm::Cityblock);
        assert_eq!(settings.reduction(), Reduction::NumVecs(4));

        std::fs::write(&path, r#"{"p": "two"}"#).unwrap();
        assert!(matches!(
            MetricSettings::load(Some(&path)),
            Err(AppError::Config(_))
        ));
    }
}
