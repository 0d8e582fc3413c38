pub mod breakdown;
pub mod difficulty;
pub mod errors;
pub mod timing;
pub mod tokens;

use std::{borrow::Borrow, collections::HashSet, hash::Hash};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::record::EvaluationRecord;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStat {
    pub count: usize,
    pub correct_count: usize,
}

impl AggregateStat {
    pub fn record(&mut self, is_correct: bool) {
        self.count += 1;
        if is_correct {
            self.correct_count += 1;
        }
    }

    pub fn incorrect_count(&self) -> usize {
        self.count - self.correct_count
    }

    /// Fraction in `[0, 1]`; an empty group reports 0.
    pub fn accuracy(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.count as f64
        }
    }

    pub fn accuracy_percent(&self) -> f64 {
        self.accuracy() * 100.0
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl FromIterator<bool> for AggregateStat {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut stat = AggregateStat::default();
        for is_correct in iter {
            stat.record(is_correct);
        }
        stat
    }
}

/// Single-pass grouping. Keys appear in first-seen order; records for which
/// `key_fn` returns `None` are skipped.
pub fn group_by<R, K, F>(records: &[R], key_fn: F) -> IndexMap<K, AggregateStat>
where
    R: Borrow<EvaluationRecord>,
    K: Hash + Eq,
    F: Fn(&EvaluationRecord) -> Option<K>,
{
    let mut groups: IndexMap<K, AggregateStat> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        let Some(key) = key_fn(record) else {
            continue;
        };
        groups.entry(key).or_default().record(record.is_correct);
    }
    groups
}

/// Key extractors for `group_by`.
pub mod keys {
    use crate::record::EvaluationRecord;

    pub fn model(record: &EvaluationRecord) -> Option<String> {
        Some(record.model.clone())
    }

    pub fn test_name(record: &EvaluationRecord) -> Option<String> {
        Some(record.test_name.clone())
    }

    pub fn subject(record: &EvaluationRecord) -> Option<String> {
        record.subject.clone().filter(|s| !s.is_empty())
    }

    pub fn year(record: &EvaluationRecord) -> Option<i32> {
        record.year
    }

    pub fn session(record: &EvaluationRecord) -> Option<String> {
        record.session.clone().filter(|s| !s.is_empty())
    }

    pub fn law_flag(record: &EvaluationRecord) -> Option<bool> {
        Some(record.is_law_related)
    }

    pub fn model_and_test(record: &EvaluationRecord) -> Option<(String, String)> {
        Some((record.model.clone(), record.test_name.clone()))
    }

    pub fn question(record: &EvaluationRecord) -> Option<String> {
        if record.question.is_empty() {
            None
        } else {
            Some(record.question.clone())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRow<K> {
    pub key: K,
    pub count: usize,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub accuracy: f64,
}

impl<K> GroupRow<K> {
    pub fn new(key: K, stat: &AggregateStat) -> Self {
        GroupRow {
            key,
            count: stat.count,
            correct_count: stat.correct_count,
            incorrect_count: stat.incorrect_count(),
            accuracy: stat.accuracy_percent(),
        }
    }
}

/// Groups sorted by accuracy, best first. The sort is stable, so equal
/// accuracies keep the map's first-seen order.
pub fn rank_by_accuracy<K: Clone>(groups: &IndexMap<K, AggregateStat>) -> Vec<GroupRow<K>> {
    let mut rows: Vec<GroupRow<K>> = groups
        .iter()
        .map(|(key, stat)| GroupRow::new(key.clone(), stat))
        .collect();
    rows.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
    rows
}

/// Unweighted mean of group accuracies, skipping empty groups. `None` when no
/// group has records.
pub fn mean_accuracy<'a, I>(stats: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a AggregateStat>,
{
    let accuracies: Vec<f64> = stats
        .into_iter()
        .filter(|stat| !stat.is_empty())
        .map(AggregateStat::accuracy)
        .collect();
    if accuracies.is_empty() {
        None
    } else {
        Some(accuracies.iter().sum::<f64>() / accuracies.len() as f64)
    }
}

pub fn overall<R: Borrow<EvaluationRecord>>(records: &[R]) -> AggregateStat {
    records
        .iter()
        .map(|record| {
            let record: &EvaluationRecord = record.borrow();
            record.is_correct
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// Accuracy percent per `[row][column]`; `None` where no record exists.
    pub cells: Vec<Vec<Option<f64>>>,
}

/// Model × `column_key` accuracy grid. Rows follow `models`; columns are the
/// column keys in first-seen order. Records without a column key are left out.
pub fn model_heatmap<R, F>(records: &[R], models: &[String], column_key: F) -> Heatmap
where
    R: Borrow<EvaluationRecord>,
    F: Fn(&EvaluationRecord) -> Option<String>,
{
    let pairs = group_by(records, |record| {
        column_key(record).map(|column| (record.model.clone(), column))
    });
    let columns: Vec<String> = group_by(records, &column_key).into_keys().collect();
    let cells = models
        .iter()
        .map(|model| {
            columns
                .iter()
                .map(|column| {
                    pairs
                        .get(&(model.clone(), column.clone()))
                        .filter(|stat| !stat.is_empty())
                        .map(AggregateStat::accuracy_percent)
                })
                .collect()
        })
        .collect();
    Heatmap {
        rows: models.to_vec(),
        columns,
        cells,
    }
}

pub fn model_test_heatmap<R: Borrow<EvaluationRecord>>(records: &[R], models: &[String]) -> Heatmap {
    model_heatmap(records, models, keys::test_name)
}

pub fn model_subject_heatmap<R: Borrow<EvaluationRecord>>(records: &[R], models: &[String]) -> Heatmap {
    model_heatmap(records, models, keys::subject)
}

/// Subjects ordered by accuracy, best first.
pub fn subject_ranking<R: Borrow<EvaluationRecord>>(records: &[R]) -> Vec<GroupRow<String>> {
    rank_by_accuracy(&group_by(records, keys::subject))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YearQuestions {
    pub year: i32,
    pub question_count: usize,
}

/// Distinct questions per year, ascending. Records without a year or a
/// question are left out.
pub fn questions_per_year<R: Borrow<EvaluationRecord>>(records: &[R]) -> Vec<YearQuestions> {
    let mut years: IndexMap<i32, HashSet<&str>> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        let Some(year) = record.year else {
            continue;
        };
        if record.question.is_empty() {
            continue;
        }
        years.entry(year).or_default().insert(record.question.as_str());
    }
    years.sort_keys();
    years
        .into_iter()
        .map(|(year, questions)| YearQuestions {
            year,
            question_count: questions.len(),
        })
        .collect()
}

/// Years in ascending order.
pub fn year_series<R: Borrow<EvaluationRecord>>(records: &[R]) -> Vec<GroupRow<i32>> {
    let mut groups = group_by(records, keys::year);
    groups.sort_keys();
    groups
        .iter()
        .map(|(year, stat)| GroupRow::new(*year, stat))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn scenario() -> Vec<EvaluationRecord> {
        vec![
            EvaluationRecord::new("A", "t", "q1", true),
            EvaluationRecord::new("A", "t", "q2", false),
            EvaluationRecord::new("B", "t", "q1", false),
            EvaluationRecord::new("B", "t", "q2", false),
        ]
    }

    #[test]
    fn group_by_model_matches_scenario() {
        let records = scenario();
        let groups = group_by(&records, keys::model);
        assert_eq!(groups["A"], AggregateStat { count: 2, correct_count: 1 });
        assert_eq!(groups["B"], AggregateStat { count: 2, correct_count: 0 });
        assert_eq!(groups["A"].accuracy(), 0.5);
        assert_eq!(groups["B"].accuracy(), 0.0);
    }

    #[test]
    fn empty_stat_has_zero_accuracy() {
        let stat = AggregateStat::default();
        assert_eq!(stat.accuracy(), 0.0);
        assert!(!stat.accuracy().is_nan());
    }

    #[test]
    fn missing_year_is_excluded_not_bucketed() {
        let mut records = scenario();
        records[0].year = Some(2020);
        records[1].year = Some(2019);
        let groups = group_by(&records, keys::year);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.values().map(|s| s.count).sum::<usize>(), 2);

        let series = year_series(&records);
        assert_eq!(series.iter().map(|r| r.key).collect::<Vec<_>>(), vec![2019, 2020]);
    }

    #[test]
    fn ranking_is_stable_on_ties() {
        let records = vec![
            EvaluationRecord::new("C", "t", "q1", true),
            EvaluationRecord::new("A", "t", "q1", true),
            EvaluationRecord::new("B", "t", "q1", false),
        ];
        let rows = rank_by_accuracy(&group_by(&records, keys::model));
        let order: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn mean_accuracy_skips_empty_groups() {
        let stats = [
            AggregateStat { count: 2, correct_count: 1 },
            AggregateStat::default(),
            AggregateStat { count: 4, correct_count: 4 },
        ];
        assert_eq!(mean_accuracy(stats.iter()), Some(0.75));
        assert_eq!(mean_accuracy([AggregateStat::default()].iter()), None);
    }

    #[test]
    fn heatmap_leaves_missing_pairs_empty() {
        let mut records = scenario();
        records.push(EvaluationRecord::new("A", "u", "q3", true));
        let models = vec!["A".to_string(), "B".to_string()];
        let heatmap = model_test_heatmap(&records, &models);
        assert_eq!(heatmap.columns, vec!["t", "u"]);
        assert_eq!(heatmap.cells[0], vec![Some(50.0), Some(100.0)]);
        assert_eq!(heatmap.cells[1], vec![Some(0.0), None]);
    }

    #[test]
    fn subject_heatmap_skips_untagged_records() {
        let mut records = scenario();
        records[0].subject = Some("Fire".to_string());
        records[2].subject = Some("Fire".to_string());
        records[3].subject = Some("Law".to_string());
        let models = vec!["A".to_string(), "B".to_string()];
        let heatmap = model_subject_heatmap(&records, &models);
        assert_eq!(heatmap.columns, vec!["Fire", "Law"]);
        assert_eq!(heatmap.cells[0], vec![Some(100.0), None]);
        assert_eq!(heatmap.cells[1], vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn questions_per_year_counts_distinct_questions() {
        let mut records = scenario();
        records[0].year = Some(2021);
        records[1].year = Some(2020);
        records[2].year = Some(2021);
        let mut untitled = EvaluationRecord::new("C", "t", "", true);
        untitled.year = Some(2020);
        records.push(untitled);
        let rows = questions_per_year(&records);
        assert_eq!(
            rows,
            vec![
                YearQuestions { year: 2020, question_count: 1 },
                YearQuestions { year: 2021, question_count: 1 },
            ]
        );
        assert_eq!(year_series(&records)[0].count, 2);
    }

    #[test]
    fn blank_subject_is_not_a_group() {
        let mut records = scenario();
        records[0].subject = Some(String::new());
        records[1].subject = Some("Fire".to_string());
        let ranking = subject_ranking(&records);
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].key, "Fire");
    }
}
