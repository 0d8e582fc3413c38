use std::borrow::Borrow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::{aggregate::AggregateStat, record::EvaluationRecord};

/// Cross-model accuracy of one question, with the metadata of the first
/// record seen for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionStat {
    pub question: String,
    pub test_name: String,
    pub subject: Option<String>,
    pub year: Option<i32>,
    pub session: Option<String>,
    pub stat: AggregateStat,
}

impl QuestionStat {
    pub fn bin(&self) -> DifficultyBin {
        DifficultyBin::classify(&self.stat)
    }

    /// Human-readable location of the question: `test / year / S<session> / subject`,
    /// leaving out the parts the records do not carry.
    pub fn label(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.test_name.is_empty() {
            parts.push(self.test_name.clone());
        }
        if let Some(year) = self.year.filter(|y| *y != 0) {
            parts.push(year.to_string());
        }
        if let Some(session) = self.session.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("S{session}"));
        }
        if let Some(subject) = self.subject.as_deref() {
            parts.push(subject.to_string());
        }
        if parts.is_empty() {
            "Unknown".to_string()
        } else {
            parts.join(" / ")
        }
    }
}

pub fn question_stats<R: Borrow<EvaluationRecord>>(records: &[R]) -> IndexMap<String, QuestionStat> {
    let mut questions: IndexMap<String, QuestionStat> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        if record.question.is_empty() {
            continue;
        }
        questions
            .entry(record.question.clone())
            .or_insert_with(|| QuestionStat {
                question: record.question.clone(),
                test_name: record.test_name.clone(),
                subject: record.subject.clone().filter(|s| !s.is_empty()),
                year: record.year,
                session: record.session.clone().filter(|s| !s.is_empty()),
                stat: AggregateStat::default(),
            })
            .stat
            .record(record.is_correct);
    }
    questions
}

/// Hardest first. The upper edge is exclusive except for `VeryEasy`, which
/// includes 100%.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DifficultyBin {
    VeryHard,
    Hard,
    Medium,
    Easy,
    VeryEasy,
}

impl DifficultyBin {
    /// `floor(5 * correct / count)` picks the 20-point band exactly, without
    /// going through a float percentage.
    pub fn classify(stat: &AggregateStat) -> DifficultyBin {
        if stat.count == 0 {
            return DifficultyBin::VeryHard;
        }
        match (stat.correct_count * 5) / stat.count {
            0 => DifficultyBin::VeryHard,
            1 => DifficultyBin::Hard,
            2 => DifficultyBin::Medium,
            3 => DifficultyBin::Easy,
            _ => DifficultyBin::VeryEasy,
        }
    }

    pub fn range_percent(&self) -> (u32, u32) {
        match self {
            DifficultyBin::VeryHard => (0, 20),
            DifficultyBin::Hard => (20, 40),
            DifficultyBin::Medium => (40, 60),
            DifficultyBin::Easy => (60, 80),
            DifficultyBin::VeryEasy => (80, 100),
        }
    }
}

/// Number of questions per bin; every bin is present, hardest first.
pub fn bin_distribution(questions: &IndexMap<String, QuestionStat>) -> IndexMap<DifficultyBin, usize> {
    let mut distribution: IndexMap<DifficultyBin, usize> =
        DifficultyBin::iter().map(|bin| (bin, 0)).collect();
    for question in questions.values() {
        *distribution.entry(question.bin()).or_default() += 1;
    }
    distribution
}

/// Each model's accuracy on the questions of each bin, where the bin comes
/// from the cross-model accuracy of the question.
pub fn model_accuracy_by_bin<R: Borrow<EvaluationRecord>>(
    records: &[R],
    questions: &IndexMap<String, QuestionStat>,
) -> IndexMap<String, IndexMap<DifficultyBin, AggregateStat>> {
    let mut by_model: IndexMap<String, IndexMap<DifficultyBin, AggregateStat>> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        let Some(question) = questions.get(&record.question) else {
            continue;
        };
        by_model
            .entry(record.model.clone())
            .or_insert_with(|| {
                DifficultyBin::iter()
                    .map(|bin| (bin, AggregateStat::default()))
                    .collect()
            })
            .entry(question.bin())
            .or_default()
            .record(record.is_correct);
    }
    by_model
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinSummary {
    pub bin: DifficultyBin,
    /// Accuracy range covered by the bin, in percent.
    pub lower_percent: u32,
    pub upper_percent: u32,
    pub question_count: usize,
    pub share_percent: f64,
    /// Mean of the member questions' accuracies; `None` for an empty bin.
    pub mean_accuracy: Option<f64>,
}

pub fn bin_summaries(questions: &IndexMap<String, QuestionStat>) -> Vec<BinSummary> {
    let total = questions.len();
    DifficultyBin::iter()
        .map(|bin| {
            let accuracies: Vec<f64> = questions
                .values()
                .filter(|q| q.bin() == bin)
                .map(|q| q.stat.accuracy_percent())
                .collect();
            let question_count = accuracies.len();
            let (lower_percent, upper_percent) = bin.range_percent();
            BinSummary {
                bin,
                lower_percent,
                upper_percent,
                question_count,
                share_percent: if total == 0 {
                    0.0
                } else {
                    question_count as f64 / total as f64 * 100.0
                },
                mean_accuracy: if accuracies.is_empty() {
                    None
                } else {
                    Some(accuracies.iter().sum::<f64>() / question_count as f64)
                },
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubjectDifficulty {
    pub subject: String,
    pub question_count: usize,
    pub mean_accuracy: f64,
}

/// Mean question accuracy per subject, hardest subject first.
pub fn subject_difficulty(questions: &IndexMap<String, QuestionStat>) -> Vec<SubjectDifficulty> {
    let mut sums: IndexMap<&str, (f64, usize)> = IndexMap::new();
    for question in questions.values() {
        let Some(subject) = question.subject.as_deref() else {
            continue;
        };
        let (sum, count) = sums.entry(subject).or_default();
        *sum += question.stat.accuracy_percent();
        *count += 1;
    }
    let mut rows: Vec<SubjectDifficulty> = sums
        .into_iter()
        .map(|(subject, (sum, count))| SubjectDifficulty {
            subject: subject.to_string(),
            question_count: count,
            mean_accuracy: sum / count as f64,
        })
        .collect();
    rows.sort_by(|a, b| a.mean_accuracy.total_cmp(&b.mean_accuracy));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(count: usize, correct_count: usize) -> AggregateStat {
        AggregateStat { count, correct_count }
    }

    #[test]
    fn bin_edges() {
        assert_eq!(DifficultyBin::classify(&stat(5, 0)), DifficultyBin::VeryHard);
        assert_eq!(DifficultyBin::classify(&stat(5, 1)), DifficultyBin::Hard);
        assert_eq!(DifficultyBin::classify(&stat(5, 2)), DifficultyBin::Medium);
        assert_eq!(DifficultyBin::classify(&stat(5, 3)), DifficultyBin::Easy);
        assert_eq!(DifficultyBin::classify(&stat(5, 4)), DifficultyBin::VeryEasy);
        assert_eq!(DifficultyBin::classify(&stat(5, 5)), DifficultyBin::VeryEasy);
        assert_eq!(DifficultyBin::classify(&stat(10, 1)), DifficultyBin::VeryHard);
        assert_eq!(DifficultyBin::classify(&stat(3, 2)), DifficultyBin::Easy);
    }

    #[test]
    fn single_attempt_questions_are_degenerate_but_valid() {
        assert_eq!(DifficultyBin::classify(&stat(1, 0)), DifficultyBin::VeryHard);
        assert_eq!(DifficultyBin::classify(&stat(1, 1)), DifficultyBin::VeryEasy);
    }

    #[test]
    fn distribution_counts_every_bin() {
        let mut records = Vec::new();
        for (i, correct) in [true, true, true, true, false].into_iter().enumerate() {
            records.push(EvaluationRecord::new(format!("m{i}"), "t", "easy", correct));
        }
        records.push(EvaluationRecord::new("m0", "t", "hard", false));
        let questions = question_stats(&records);
        let distribution = bin_distribution(&questions);
        assert_eq!(distribution.len(), 5);
        assert_eq!(distribution[&DifficultyBin::VeryEasy], 1);
        assert_eq!(distribution[&DifficultyBin::VeryHard], 1);
        assert_eq!(distribution[&DifficultyBin::Medium], 0);
        assert_eq!(distribution.keys().next(), Some(&DifficultyBin::VeryHard));

        let summaries = bin_summaries(&questions);
        assert_eq!(summaries[4].mean_accuracy, Some(80.0));
        assert_eq!(summaries[2].mean_accuracy, None);
        assert_eq!(summaries[0].share_percent, 50.0);
        assert_eq!((summaries[0].lower_percent, summaries[0].upper_percent), (0, 20));
        assert_eq!((summaries[4].lower_percent, summaries[4].upper_percent), (80, 100));
    }

    #[test]
    fn per_model_bins_use_cross_model_difficulty() {
        let records = vec![
            EvaluationRecord::new("A", "t", "q1", true),
            EvaluationRecord::new("B", "t", "q1", false),
            EvaluationRecord::new("A", "t", "q2", true),
            EvaluationRecord::new("B", "t", "q2", true),
        ];
        let questions = question_stats(&records);
        let by_model = model_accuracy_by_bin(&records, &questions);
        assert_eq!(by_model["B"][&DifficultyBin::Medium], stat(1, 0));
        assert_eq!(by_model["B"][&DifficultyBin::VeryEasy], stat(1, 1));
        assert_eq!(by_model["A"][&DifficultyBin::Hard], stat(0, 0));
    }

    #[test]
    fn label_lists_available_location_parts() {
        let mut record = EvaluationRecord::new("A", "fire_safety", "q1", true);
        record.year = Some(2021);
        record.session = Some("2".to_string());
        record.subject = Some("Law".to_string());
        let bare = EvaluationRecord::new("A", "fire_safety", "q2", true);
        let questions = question_stats(&[record, bare]);
        assert_eq!(questions["q1"].label(), "fire_safety / 2021 / S2 / Law");
        assert_eq!(questions["q2"].label(), "fire_safety");
    }

    #[test]
    fn subjects_sorted_hardest_first() {
        let mut hard = EvaluationRecord::new("A", "t", "q1", false);
        hard.subject = Some("Law".to_string());
        let mut easy = EvaluationRecord::new("A", "t", "q2", true);
        easy.subject = Some("Fire".to_string());
        let untagged = EvaluationRecord::new("A", "t", "q3", true);
        let questions = question_stats(&[easy, hard, untagged]);
        let rows = subject_difficulty(&questions);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].subject, "Law");
        assert_eq!(rows[1].mean_accuracy, 100.0);
    }
}
