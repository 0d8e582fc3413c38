use std::borrow::Borrow;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    aggregate::AggregateStat,
    error::ConfigurationError,
    record::{EvaluationRecord, RecordOrigin},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VotingMethod {
    #[default]
    Majority,
    Weighted,
}

/// Which questions get a synthesized answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Coverage {
    /// Any question at least one member answered; absent members do not vote.
    #[default]
    AnyMember,
    /// Only questions every member answered.
    AllMembers,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    /// Stored trimmed; the synthesized records carry this exact name.
    #[serde(deserialize_with = "trimmed")]
    pub name: String,
    pub members: IndexSet<String>,
    #[serde(default)]
    pub method: VotingMethod,
    /// Per-member weights for `Weighted`; missing members weigh 1.0.
    #[serde(default)]
    pub weights: IndexMap<String, f64>,
    #[serde(default)]
    pub coverage: Coverage,
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let name = String::deserialize(deserializer)?;
    Ok(name.trim().to_string())
}

impl Ensemble {
    pub fn new<I, S>(name: impl Into<String>, members: I, method: VotingMethod) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name: String = name.into();
        Ensemble {
            name: name.trim().to_string(),
            members: members.into_iter().map(Into::into).collect(),
            method,
            weights: IndexMap::new(),
            coverage: Coverage::default(),
        }
    }

    pub fn with_weight(mut self, model: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(model.into(), weight);
        self
    }

    pub fn with_coverage(mut self, coverage: Coverage) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn weight_of(&self, model: &str) -> f64 {
        match self.method {
            VotingMethod::Majority => 1.0,
            VotingMethod::Weighted => self.weights.get(model).copied().unwrap_or(1.0),
        }
    }

    /// Checks the definition against the ensembles already defined and the
    /// models present in the base records.
    pub fn validate(&self, existing: &[Ensemble], base_models: &IndexSet<String>) -> Result<(), ConfigurationError> {
        let name = self.name.as_str();
        if name.is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        if self.members.len() < 2 {
            return Err(ConfigurationError::TooFewMembers {
                name: self.name.clone(),
                count: self.members.len(),
            });
        }
        if existing.iter().any(|e| e.name == name) {
            return Err(ConfigurationError::DuplicateEnsemble(self.name.clone()));
        }
        if base_models.contains(name) {
            return Err(ConfigurationError::NameCollidesWithModel(self.name.clone()));
        }
        if let Some(model) = self.members.iter().find(|m| !base_models.contains(*m)) {
            return Err(ConfigurationError::UnknownMember {
                name: self.name.clone(),
                model: model.clone(),
            });
        }
        for (model, weight) in &self.weights {
            if !self.members.contains(model) {
                return Err(ConfigurationError::WeightForNonMember {
                    name: self.name.clone(),
                    model: model.clone(),
                });
            }
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(ConfigurationError::InvalidWeight {
                    name: self.name.clone(),
                    model: model.clone(),
                    weight: *weight,
                });
            }
        }
        Ok(())
    }
}

struct QuestionVotes<'a> {
    first: &'a EvaluationRecord,
    by_member: IndexMap<&'a str, AggregateStat>,
}

/// Produces one record per covered question with `model = ensemble.name`.
/// Each member votes with the fraction of its records on the question that
/// are correct, and the ensemble is correct when the weighted mean of the
/// votes is strictly above one half.
pub fn synthesize<R: Borrow<EvaluationRecord>>(base: &[R], ensemble: &Ensemble) -> Vec<EvaluationRecord> {
    let mut questions: IndexMap<&str, QuestionVotes> = IndexMap::new();
    for record in base {
        let record: &EvaluationRecord = record.borrow();
        if record.is_synthetic() || record.question.is_empty() || !ensemble.members.contains(&record.model) {
            continue;
        }
        questions
            .entry(record.question.as_str())
            .or_insert_with(|| QuestionVotes {
                first: record,
                by_member: IndexMap::new(),
            })
            .by_member
            .entry(record.model.as_str())
            .or_default()
            .record(record.is_correct);
    }

    let synthesized: Vec<EvaluationRecord> = questions
        .into_values()
        .filter(|votes| match ensemble.coverage {
            Coverage::AnyMember => true,
            Coverage::AllMembers => votes.by_member.len() == ensemble.members.len(),
        })
        .map(|votes| {
            let (score, total_weight) = votes
                .by_member
                .iter()
                .fold((0.0, 0.0), |(score, total), (model, stat)| {
                    let weight = ensemble.weight_of(model);
                    (score + weight * stat.accuracy(), total + weight)
                });
            let is_correct = total_weight > 0.0 && score / total_weight > 0.5;
            EvaluationRecord {
                model: ensemble.name.clone(),
                is_correct,
                response_time_seconds: None,
                input_tokens: None,
                output_tokens: None,
                cost_usd: None,
                origin: RecordOrigin::Ensemble,
                ..votes.first.clone()
            }
        })
        .collect();
    log::info!(
        "Synthesized {} records for ensemble {} ({} over {} members)",
        synthesized.len(),
        ensemble.name,
        ensemble.method,
        ensemble.members.len()
    );
    synthesized
}

pub fn synthesize_all<R: Borrow<EvaluationRecord>>(base: &[R], ensembles: &[Ensemble]) -> Vec<EvaluationRecord> {
    ensembles
        .iter()
        .flat_map(|ensemble| synthesize(base, ensemble))
        .collect()
}
