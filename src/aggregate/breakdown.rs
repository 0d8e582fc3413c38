use std::{borrow::Borrow, collections::HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{group_by, keys, AggregateStat},
    record::EvaluationRecord,
};

/// Number of distinct question keys; records without one are not counted.
pub fn distinct_questions<'a, I>(records: I) -> usize
where
    I: IntoIterator<Item = &'a EvaluationRecord>,
{
    records
        .into_iter()
        .map(|r| r.question.as_str())
        .filter(|q| !q.is_empty())
        .collect::<HashSet<&str>>()
        .len()
}

fn percent_of(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LawSplit {
    pub law: AggregateStat,
    pub non_law: AggregateStat,
}

impl LawSplit {
    fn record(&mut self, record: &EvaluationRecord) {
        if record.is_law_related {
            self.law.record(record.is_correct);
        } else {
            self.non_law.record(record.is_correct);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LawBreakdown {
    pub overall: LawSplit,
    pub law_questions: usize,
    pub non_law_questions: usize,
    pub law_question_share: f64,
    pub non_law_question_share: f64,
    pub by_model: IndexMap<String, LawSplit>,
}

pub fn law_breakdown<R: Borrow<EvaluationRecord>>(records: &[R]) -> LawBreakdown {
    let mut overall = LawSplit::default();
    let mut by_model: IndexMap<String, LawSplit> = IndexMap::new();
    let mut law_records: Vec<&EvaluationRecord> = Vec::new();
    let mut non_law_records: Vec<&EvaluationRecord> = Vec::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        overall.record(record);
        by_model.entry(record.model.clone()).or_default().record(record);
        if record.is_law_related {
            law_records.push(record);
        } else {
            non_law_records.push(record);
        }
    }
    let law_questions = distinct_questions(law_records);
    let non_law_questions = distinct_questions(non_law_records);
    let total = law_questions + non_law_questions;
    LawBreakdown {
        overall,
        law_questions,
        non_law_questions,
        law_question_share: percent_of(law_questions, total),
        non_law_question_share: percent_of(non_law_questions, total),
        by_model,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestSetStat {
    pub test_name: String,
    pub total_questions: usize,
    pub law_questions: usize,
    pub non_law_questions: usize,
    pub evaluations: usize,
    pub accuracy: f64,
}

/// One row per test in first-seen order.
pub fn test_set_stats<R: Borrow<EvaluationRecord>>(records: &[R]) -> Vec<TestSetStat> {
    let mut questions: IndexMap<&str, (HashSet<&str>, HashSet<&str>)> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        let (all, law) = questions.entry(record.test_name.as_str()).or_default();
        if record.question.is_empty() {
            continue;
        }
        all.insert(record.question.as_str());
        if record.is_law_related {
            law.insert(record.question.as_str());
        }
    }
    let stats = group_by(records, keys::test_name);
    questions
        .into_iter()
        .map(|(test_name, (all, law))| {
            let stat = stats.get(test_name).copied().unwrap_or_default();
            TestSetStat {
                test_name: test_name.to_string(),
                total_questions: all.len(),
                law_questions: law.len(),
                non_law_questions: all.len() - law.len(),
                evaluations: stat.count,
                accuracy: stat.accuracy_percent(),
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestExtremes {
    pub hardest: Option<TestSetStat>,
    pub easiest: Option<TestSetStat>,
}

/// Lowest and highest accuracy test; ties go to the first-seen test.
pub fn test_extremes(rows: &[TestSetStat]) -> TestExtremes {
    let mut hardest: Option<&TestSetStat> = None;
    let mut easiest: Option<&TestSetStat> = None;
    for row in rows {
        if hardest.map_or(true, |h| row.accuracy < h.accuracy) {
            hardest = Some(row);
        }
        if easiest.map_or(true, |e| row.accuracy > e.accuracy) {
            easiest = Some(row);
        }
    }
    TestExtremes {
        hardest: hardest.cloned(),
        easiest: easiest.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn law(model: &str, test: &str, question: &str, correct: bool) -> EvaluationRecord {
        let mut record = EvaluationRecord::new(model, test, question, correct);
        record.is_law_related = true;
        record
    }

    fn sample() -> Vec<EvaluationRecord> {
        vec![
            law("A", "safety", "q1", true),
            law("B", "safety", "q1", false),
            EvaluationRecord::new("A", "safety", "q2", true),
            EvaluationRecord::new("A", "fire", "q3", false),
            EvaluationRecord::new("B", "fire", "q3", false),
        ]
    }

    #[test]
    fn law_split_counts_records_and_questions() {
        let breakdown = law_breakdown(&sample());
        assert_eq!(breakdown.overall.law, AggregateStat { count: 2, correct_count: 1 });
        assert_eq!(breakdown.overall.non_law, AggregateStat { count: 3, correct_count: 1 });
        assert_eq!(breakdown.law_questions, 1);
        assert_eq!(breakdown.non_law_questions, 2);
        assert!((breakdown.law_question_share - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(breakdown.by_model["B"].non_law, AggregateStat { count: 1, correct_count: 0 });
    }

    #[test]
    fn test_sets_count_distinct_questions() {
        let rows = test_set_stats(&sample());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].test_name, "safety");
        assert_eq!(rows[0].total_questions, 2);
        assert_eq!(rows[0].law_questions, 1);
        assert_eq!(rows[0].non_law_questions, 1);
        assert_eq!(rows[0].evaluations, 3);

        let extremes = test_extremes(&rows);
        assert_eq!(extremes.hardest.map(|r| r.test_name), Some("fire".to_string()));
        assert_eq!(extremes.easiest.map(|r| r.test_name), Some("safety".to_string()));
    }

    #[test]
    fn records_without_question_count_as_evaluations_only() {
        let mut records = sample();
        records.push(EvaluationRecord::new("C", "fire", "", true));
        let rows = test_set_stats(&records);
        assert_eq!(rows[1].total_questions, 1);
        assert_eq!(rows[1].evaluations, 3);
        assert_eq!(law_breakdown(&records).non_law_questions, 2);
    }

    #[test]
    fn empty_input_has_zero_shares() {
        let records: Vec<EvaluationRecord> = Vec::new();
        let breakdown = law_breakdown(&records);
        assert_eq!(breakdown.law_question_share, 0.0);
        assert!(test_extremes(&test_set_stats(&records)).hardest.is_none());
    }
}
