use indexmap::IndexSet;

use crate::{
    config::{AnalysisConfig, ReportConfig},
    ensemble::{synthesize, synthesize_all, Ensemble},
    error::Result,
    filter::{self, FilterCriteria},
    record::EvaluationRecord,
};

/// Everything a session works on: the measured records, the ensembles defined
/// over them with their synthesized records, and the active filter.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    records: Vec<EvaluationRecord>,
    ensembles: Vec<Ensemble>,
    synthetic: Vec<EvaluationRecord>,
    pub criteria: FilterCriteria,
    pub analysis: AnalysisConfig,
}

impl AppState {
    pub fn new(records: Vec<EvaluationRecord>) -> Self {
        AppState {
            records,
            ..Default::default()
        }
    }

    /// Builds a state from loaded records and a report config. Every ensemble
    /// in the config must validate.
    pub fn from_config(records: Vec<EvaluationRecord>, config: ReportConfig) -> Result<Self> {
        let mut state = AppState::new(records);
        state.criteria = config.criteria;
        state.analysis = config.analysis;
        for ensemble in config.ensembles {
            state.add_ensemble(ensemble)?;
        }
        Ok(state)
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    pub fn ensembles(&self) -> &[Ensemble] {
        &self.ensembles
    }

    pub fn synthetic_records(&self) -> &[EvaluationRecord] {
        &self.synthetic
    }

    pub fn base_models(&self) -> IndexSet<String> {
        self.records
            .iter()
            .filter(|r| !r.is_synthetic())
            .map(|r| r.model.clone())
            .collect()
    }

    /// Validates and registers an ensemble. On error nothing changes.
    pub fn add_ensemble(&mut self, ensemble: Ensemble) -> Result<()> {
        ensemble.validate(&self.ensembles, &self.base_models())?;
        let records = synthesize(&self.records, &ensemble);
        self.synthetic.extend(records);
        self.ensembles.push(ensemble);
        Ok(())
    }

    pub fn remove_ensemble(&mut self, name: &str) -> bool {
        let before = self.ensembles.len();
        self.ensembles.retain(|e| e.name != name);
        if self.ensembles.len() == before {
            return false;
        }
        self.synthetic.retain(|r| r.model != name);
        log::info!("Removed ensemble {}", name);
        true
    }

    /// Swaps in a new record set. Ensembles whose members are gone are
    /// dropped; the rest are synthesized again from the new records.
    pub fn replace_records(&mut self, records: Vec<EvaluationRecord>) {
        self.records = records;
        let base_models = self.base_models();
        let mut kept: Vec<Ensemble> = Vec::new();
        for ensemble in std::mem::take(&mut self.ensembles) {
            match ensemble.validate(&kept, &base_models) {
                Ok(()) => kept.push(ensemble),
                Err(err) => log::warn!("Dropping ensemble {} after reload: {}", ensemble.name, err),
            }
        }
        self.synthetic = synthesize_all(&self.records, &kept);
        self.ensembles = kept;
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
    }

    /// Measured records followed by synthesized ones.
    pub fn working_set(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.records.iter().chain(self.synthetic.iter())
    }

    pub fn filtered(&self) -> Vec<&EvaluationRecord> {
        filter::apply(self.working_set(), &self.criteria)
    }
}
