use std::borrow::Borrow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{aggregate::AggregateStat, record::EvaluationRecord};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeStat {
    pub model: String,
    pub count: usize,
    pub accuracy: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Summary of a sample. The median is the element at index `n / 2` of the
/// ascending sort, so even-length samples take the upper middle. The standard
/// deviation divides by `n`.
pub fn summarize(values: &[f64]) -> Option<SummaryStatistics> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(SummaryStatistics {
        mean,
        median: sorted[sorted.len() / 2],
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
    })
}

/// Per-model timing over records that carry a response time, fastest first.
pub fn time_stats<R: Borrow<EvaluationRecord>>(records: &[R]) -> Vec<TimeStat> {
    let mut samples: IndexMap<&str, (Vec<f64>, AggregateStat)> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        let Some(seconds) = record.response_time_seconds.filter(|t| t.is_finite()) else {
            continue;
        };
        let (times, stat) = samples.entry(record.model.as_str()).or_default();
        times.push(seconds);
        stat.record(record.is_correct);
    }
    let mut rows: Vec<TimeStat> = samples
        .into_iter()
        .filter_map(|(model, (times, stat))| {
            let summary = summarize(&times)?;
            Some(TimeStat {
                model: model.to_string(),
                count: stat.count,
                accuracy: stat.accuracy_percent(),
                mean: summary.mean,
                median: summary.median,
                std_dev: summary.std_dev,
                min: summary.min,
                max: summary.max,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.mean.total_cmp(&b.mean));
    rows
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSummary {
    pub fastest: Option<TimeStat>,
    pub slowest: Option<TimeStat>,
    pub mean_of_means: Option<f64>,
    /// Slowest mean divided by fastest mean.
    pub speed_ratio: Option<f64>,
    /// Fastest model's accuracy divided by the slowest model's.
    pub accuracy_ratio: Option<f64>,
}

pub fn time_summary(rows: &[TimeStat]) -> TimeSummary {
    let fastest = rows.first().cloned();
    let slowest = rows.last().cloned();
    let mean_of_means = if rows.is_empty() {
        None
    } else {
        Some(rows.iter().map(|r| r.mean).sum::<f64>() / rows.len() as f64)
    };
    let (speed_ratio, accuracy_ratio) = match (&fastest, &slowest) {
        (Some(fastest), Some(slowest)) => (
            ratio(slowest.mean, fastest.mean),
            ratio(fastest.accuracy, slowest.accuracy),
        ),
        _ => (None, None),
    };
    TimeSummary {
        fastest,
        slowest,
        mean_of_means,
        speed_ratio,
        accuracy_ratio,
    }
}

pub(crate) fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}
