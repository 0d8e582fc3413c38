use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    ensemble::Ensemble,
    error::{Error, Result},
    filter::FilterCriteria,
};

/* ---------------------------------------------------------------------------------------------------- */
/* Analysis Settings                                                                                    */
/* ---------------------------------------------------------------------------------------------------- */

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Length of the most-missed question list in the error view.
    pub top_error_questions: usize,
    /// Questions attempted fewer times are left out of common-failure analysis.
    pub min_attempts: usize,
    /// How many of the most accurate models receive a composite score.
    pub composite_top_n: usize,
    /// Score given on a time or token axis to a model with no data for it.
    pub neutral_axis_score: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            top_error_questions: 20,
            min_attempts: 2,
            composite_top_n: 5,
            neutral_axis_score: 50.0,
        }
    }
}

/* ---------------------------------------------------------------------------------------------------- */
/* Report Configuration                                                                                 */
/* ---------------------------------------------------------------------------------------------------- */

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub criteria: FilterCriteria,
    pub ensembles: Vec<Ensemble>,
    pub analysis: AnalysisConfig,
}

impl ReportConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<ReportConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ReportConfig = serde_json::from_str(&text).map_err(|source| Error::Json {
            path: path.display().to_string(),
            source,
        })?;
        log::info!(
            "Loaded report config from {} with {} ensembles",
            path.display(),
            config.ensembles.len()
        );
        Ok(config)
    }
}
