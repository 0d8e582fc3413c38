use std::{
    borrow::Borrow,
    collections::{BTreeSet, HashSet},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::difficulty::{question_stats, QuestionStat},
    filter::FilterCriteria,
    record::EvaluationRecord,
};

/// Records that take part in error analysis. Ensemble records would agree with
/// their own members by construction, so they only count when the ensemble
/// was picked by name.
pub fn error_population<'a, R: Borrow<EvaluationRecord>>(
    records: &'a [R],
    criteria: &FilterCriteria,
) -> Vec<&'a EvaluationRecord> {
    records
        .iter()
        .map(|record| {
            let record: &'a EvaluationRecord = record.borrow();
            record
        })
        .filter(|record| !record.is_synthetic() || criteria.explicitly_selects_model(&record.model))
        .collect()
}

pub fn incorrect_questions<R: Borrow<EvaluationRecord>>(records: &[R]) -> IndexMap<String, HashSet<String>> {
    let mut sets: IndexMap<String, HashSet<String>> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        let wrong = sets.entry(record.model.clone()).or_default();
        if !record.is_correct && !record.question.is_empty() {
            wrong.insert(record.question.clone());
        }
    }
    sets
}

/// Jaccard index of two wrong-answer sets as a percentage. An empty union
/// gives 0.
pub fn jaccard_percent(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64 * 100.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorOverlapMatrix {
    pub models: Vec<String>,
    pub similarity: Vec<Vec<f64>>,
}

impl ErrorOverlapMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.models.iter().position(|m| m == a)?;
        let j = self.models.iter().position(|m| m == b)?;
        Some(self.similarity[i][j])
    }
}

/// Pairwise error similarity. The diagonal is 100 by definition, including
/// for a model that made no mistakes.
pub fn error_overlap<R: Borrow<EvaluationRecord>>(records: &[R]) -> ErrorOverlapMatrix {
    let wrong = incorrect_questions(records);
    let models: Vec<String> = wrong.keys().cloned().collect();
    let similarity = wrong
        .iter()
        .map(|(m1, set1)| {
            wrong
                .iter()
                .map(|(m2, set2)| {
                    if m1 == m2 {
                        100.0
                    } else {
                        jaccard_percent(set1, set2)
                    }
                })
                .collect()
        })
        .collect();
    ErrorOverlapMatrix { models, similarity }
}

pub fn similarity<R: Borrow<EvaluationRecord>>(records: &[R], a: &str, b: &str) -> f64 {
    if a == b {
        return 100.0;
    }
    let wrong = incorrect_questions(records);
    let empty = HashSet::new();
    jaccard_percent(
        wrong.get(a).unwrap_or(&empty),
        wrong.get(b).unwrap_or(&empty),
    )
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissedQuestion {
    pub question: String,
    /// `test / year / S<session> / subject` of the first record seen.
    pub label: String,
    pub test_name: String,
    pub subject: Option<String>,
    pub year: Option<i32>,
    pub wrong_count: usize,
    pub attempts: usize,
    pub wrong_rate: f64,
    /// Distinct model names, sorted.
    pub attempted_models: Vec<String>,
    pub correct_models: Vec<String>,
    pub incorrect_models: Vec<String>,
}

#[derive(Default)]
struct ModelOutcomes<'a> {
    correct: BTreeSet<&'a str>,
    incorrect: BTreeSet<&'a str>,
}

fn owned(models: &BTreeSet<&str>) -> Vec<String> {
    models.iter().map(|m| m.to_string()).collect()
}

impl MissedQuestion {
    fn new(question: &QuestionStat, outcomes: Option<&ModelOutcomes>) -> Self {
        let (attempted_models, correct_models, incorrect_models) = match outcomes {
            Some(outcomes) => (
                owned(&outcomes.correct.union(&outcomes.incorrect).copied().collect()),
                owned(&outcomes.correct),
                owned(&outcomes.incorrect),
            ),
            None => Default::default(),
        };
        MissedQuestion {
            question: question.question.clone(),
            label: question.label(),
            test_name: question.test_name.clone(),
            subject: question.subject.clone(),
            year: question.year,
            wrong_count: question.stat.incorrect_count(),
            attempts: question.stat.count,
            wrong_rate: if question.stat.count == 0 {
                0.0
            } else {
                question.stat.incorrect_count() as f64 / question.stat.count as f64 * 100.0
            },
            attempted_models,
            correct_models,
            incorrect_models,
        }
    }

    pub fn is_universal_miss(&self) -> bool {
        self.attempts > 0 && self.wrong_count == self.attempts
    }

    pub fn is_majority_miss(&self) -> bool {
        self.attempts > 0 && self.wrong_count * 2 >= self.attempts
    }
}

/// Questions with at least `min_attempts` attempts, most-missed first. Equal
/// wrong rates keep first-seen order.
pub fn missed_questions<R: Borrow<EvaluationRecord>>(records: &[R], min_attempts: usize) -> Vec<MissedQuestion> {
    let mut outcomes: IndexMap<&str, ModelOutcomes> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        if record.question.is_empty() {
            continue;
        }
        let entry = outcomes.entry(record.question.as_str()).or_default();
        if record.is_correct {
            entry.correct.insert(record.model.as_str());
        } else {
            entry.incorrect.insert(record.model.as_str());
        }
    }
    let mut rows: Vec<MissedQuestion> = question_stats(records)
        .values()
        .filter(|q| q.stat.count >= min_attempts)
        .map(|q| MissedQuestion::new(q, outcomes.get(q.question.as_str())))
        .collect();
    rows.sort_by(|a, b| b.wrong_rate.total_cmp(&a.wrong_rate));
    rows
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommonFailures {
    /// Every attempting model was wrong.
    pub universal: Vec<MissedQuestion>,
    /// At least half of the attempting models were wrong.
    pub majority: Vec<MissedQuestion>,
}

pub fn common_failures(missed: &[MissedQuestion]) -> CommonFailures {
    CommonFailures {
        universal: missed
            .iter()
            .filter(|q| q.is_universal_miss())
            .cloned()
            .collect(),
        majority: missed
            .iter()
            .filter(|q| q.is_majority_miss())
            .cloned()
            .collect(),
    }
}
