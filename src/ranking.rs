use std::borrow::Borrow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{
        breakdown::{distinct_questions, law_breakdown},
        group_by, keys, mean_accuracy,
        timing::time_stats,
        tokens::token_stats,
    },
    config::AnalysisConfig,
    record::EvaluationRecord,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRanking {
    pub model: String,
    pub count: usize,
    pub correct_count: usize,
    pub accuracy: f64,
    pub mean_time_seconds: Option<f64>,
    pub tokens_per_correct: Option<f64>,
}

/// Models ordered by accuracy, best first, with their timing and token
/// efficiency where the records carry them.
pub fn model_rankings<R: Borrow<EvaluationRecord>>(records: &[R]) -> Vec<ModelRanking> {
    let times: IndexMap<String, f64> = time_stats(records)
        .into_iter()
        .map(|row| (row.model, row.mean))
        .collect();
    let tokens: IndexMap<String, Option<f64>> = token_stats(records)
        .into_iter()
        .map(|row| (row.model, row.tokens_per_correct))
        .collect();
    let mut rows: Vec<ModelRanking> = group_by(records, keys::model)
        .into_iter()
        .map(|(model, stat)| ModelRanking {
            count: stat.count,
            correct_count: stat.correct_count,
            accuracy: stat.accuracy_percent(),
            mean_time_seconds: times.get(&model).copied(),
            tokens_per_correct: tokens.get(&model).copied().flatten(),
            model,
        })
        .collect();
    rows.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
    rows
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Highlights {
    pub most_accurate: Option<String>,
    pub fastest: Option<String>,
    pub most_efficient: Option<String>,
}

fn lowest_by<F>(rows: &[ModelRanking], value: F) -> Option<String>
where
    F: Fn(&ModelRanking) -> Option<f64>,
{
    rows.iter()
        .filter_map(|row| value(row).map(|v| (row, v)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(row, _)| row.model.clone())
}

/// Expects `rows` in the order produced by `model_rankings`.
pub fn highlights(rows: &[ModelRanking]) -> Highlights {
    Highlights {
        most_accurate: rows.first().map(|row| row.model.clone()),
        fastest: lowest_by(rows, |row| row.mean_time_seconds),
        most_efficient: lowest_by(rows, |row| row.tokens_per_correct),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub model: String,
    pub accuracy_score: f64,
    pub speed_score: f64,
    pub efficiency_score: f64,
    pub overall: f64,
}

fn inverted_axis(value: Option<f64>, max: f64, neutral: f64) -> f64 {
    match value {
        Some(value) => 100.0 * (1.0 - value / max),
        None => neutral,
    }
}

fn axis_max<F>(rows: &[ModelRanking], value: F) -> f64
where
    F: Fn(&ModelRanking) -> Option<f64>,
{
    let max = rows
        .iter()
        .filter_map(value)
        .fold(0.0_f64, f64::max);
    if max > 0.0 {
        max
    } else {
        1.0
    }
}

/// Scores the `composite_top_n` most accurate models on accuracy, speed and
/// token efficiency, each on a 0 to 100 scale relative to that group.
pub fn composite_scores(rows: &[ModelRanking], config: &AnalysisConfig) -> Vec<CompositeScore> {
    let top = &rows[..rows.len().min(config.composite_top_n)];
    let max_accuracy = top.iter().map(|row| row.accuracy).fold(0.0_f64, f64::max);
    let max_time = axis_max(top, |row| row.mean_time_seconds);
    let max_tokens = axis_max(top, |row| row.tokens_per_correct);
    top.iter()
        .map(|row| {
            let accuracy_score = if max_accuracy > 0.0 {
                100.0 * row.accuracy / max_accuracy
            } else {
                0.0
            };
            let speed_score = inverted_axis(row.mean_time_seconds, max_time, config.neutral_axis_score);
            let efficiency_score = inverted_axis(row.tokens_per_correct, max_tokens, config.neutral_axis_score);
            CompositeScore {
                model: row.model.clone(),
                accuracy_score,
                speed_score,
                efficiency_score,
                overall: (accuracy_score + speed_score + efficiency_score) / 3.0,
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverviewInsight {
    pub total_questions: usize,
    pub model_count: usize,
    pub evaluation_count: usize,
    /// Unweighted mean of per-model accuracies, as a percentage.
    pub mean_accuracy: f64,
    pub expected_correct: usize,
    pub expected_wrong: usize,
    pub law_questions: usize,
    pub non_law_questions: usize,
    pub law_accuracy: f64,
    pub non_law_accuracy: f64,
}

pub fn overview<R: Borrow<EvaluationRecord>>(records: &[R]) -> OverviewInsight {
    let by_model = group_by(records, keys::model);
    let mean = mean_accuracy(by_model.values()).unwrap_or(0.0);
    let total_questions = distinct_questions(records.iter().map(|record| {
        let record: &EvaluationRecord = record.borrow();
        record
    }));
    let expected_correct = ((total_questions as f64 * mean).round() as usize).min(total_questions);
    let law = law_breakdown(records);
    OverviewInsight {
        total_questions,
        model_count: by_model.len(),
        evaluation_count: records.len(),
        mean_accuracy: mean * 100.0,
        expected_correct,
        expected_wrong: total_questions - expected_correct,
        law_questions: law.law_questions,
        non_law_questions: law.non_law_questions,
        law_accuracy: law.overall.law.accuracy_percent(),
        non_law_accuracy: law.overall.non_law.accuracy_percent(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::scenario;

    fn row(model: &str, accuracy: f64, time: Option<f64>, tokens: Option<f64>) -> ModelRanking {
        ModelRanking {
            model: model.to_string(),
            count: 10,
            correct_count: (accuracy / 10.0) as usize,
            accuracy,
            mean_time_seconds: time,
            tokens_per_correct: tokens,
        }
    }

    #[test]
    fn rankings_follow_accuracy() {
        let rows = model_rankings(&scenario());
        assert_eq!(rows[0].model, "A");
        assert_eq!(rows[0].accuracy, 50.0);
        assert_eq!(rows[1].accuracy, 0.0);
        assert_eq!(rows[0].mean_time_seconds, None);
    }

    #[test]
    fn highlights_skip_models_without_data() {
        let rows = vec![
            row("A", 90.0, None, Some(500.0)),
            row("B", 80.0, Some(2.0), None),
            row("C", 70.0, Some(1.0), Some(800.0)),
        ];
        let best = highlights(&rows);
        assert_eq!(best.most_accurate.as_deref(), Some("A"));
        assert_eq!(best.fastest.as_deref(), Some("C"));
        assert_eq!(best.most_efficient.as_deref(), Some("A"));
        assert_eq!(highlights(&[]), Highlights::default());
    }

    #[test]
    fn composite_axes_are_relative_to_the_top_group() {
        let rows = vec![
            row("A", 80.0, Some(4.0), Some(100.0)),
            row("B", 40.0, Some(2.0), None),
            row("C", 20.0, Some(100.0), Some(1.0)),
        ];
        let config = AnalysisConfig {
            composite_top_n: 2,
            ..Default::default()
        };
        let scores = composite_scores(&rows, &config);
        assert_eq!(scores.len(), 2);

        let a = &scores[0];
        assert_eq!(a.accuracy_score, 100.0);
        assert_eq!(a.speed_score, 0.0);
        assert_eq!(a.efficiency_score, 0.0);

        let b = &scores[1];
        assert_eq!(b.accuracy_score, 50.0);
        assert_eq!(b.speed_score, 50.0);
        assert_eq!(b.efficiency_score, 50.0);
        assert_eq!(b.overall, 50.0);
    }

    #[test]
    fn composite_without_accuracy_or_measurements() {
        let rows = vec![row("A", 0.0, None, None), row("B", 0.0, None, None)];
        let scores = composite_scores(&rows, &AnalysisConfig::default());
        assert_eq!(scores[0].accuracy_score, 0.0);
        assert_eq!(scores[0].speed_score, 50.0);
        assert!(scores.iter().all(|s| s.overall.is_finite()));
    }

    #[test]
    fn overview_of_scenario() {
        let insight = overview(&scenario());
        assert_eq!(insight.total_questions, 2);
        assert_eq!(insight.model_count, 2);
        assert_eq!(insight.evaluation_count, 4);
        assert_eq!(insight.mean_accuracy, 25.0);
        assert_eq!(insight.expected_correct, 1);
        assert_eq!(insight.expected_wrong, 1);
        assert_eq!(insight.law_questions, 0);
        assert_eq!(insight.non_law_accuracy, 25.0);
    }
}
