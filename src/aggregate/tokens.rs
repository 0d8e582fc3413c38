use std::borrow::Borrow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{timing::ratio, AggregateStat},
    record::EvaluationRecord,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenStat {
    pub model: String,
    pub count: usize,
    pub correct_count: usize,
    pub accuracy: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub average_tokens: f64,
    /// `None` when the model answered nothing correctly.
    pub tokens_per_correct: Option<f64>,
    pub cost_usd: f64,
}

#[derive(Default)]
struct TokenAccumulator {
    stat: AggregateStat,
    input: u64,
    output: u64,
    cost: f64,
}

/// Per-model token usage over records carrying token data, largest total first.
pub fn token_stats<R: Borrow<EvaluationRecord>>(records: &[R]) -> Vec<TokenStat> {
    let mut accumulators: IndexMap<&str, TokenAccumulator> = IndexMap::new();
    for record in records {
        let record: &EvaluationRecord = record.borrow();
        if !record.has_token_data() {
            continue;
        }
        let acc = accumulators.entry(record.model.as_str()).or_default();
        acc.stat.record(record.is_correct);
        acc.input = acc.input.saturating_add(record.input_tokens.unwrap_or(0));
        acc.output = acc.output.saturating_add(record.output_tokens.unwrap_or(0));
        acc.cost += record.cost_usd.filter(|c| c.is_finite()).unwrap_or(0.0);
    }
    let mut rows: Vec<TokenStat> = accumulators
        .into_iter()
        .map(|(model, acc)| {
            let total = acc.input.saturating_add(acc.output);
            TokenStat {
                model: model.to_string(),
                count: acc.stat.count,
                correct_count: acc.stat.correct_count,
                accuracy: acc.stat.accuracy_percent(),
                input_tokens: acc.input,
                output_tokens: acc.output,
                total_tokens: total,
                average_tokens: ratio(total as f64, acc.stat.count as f64).unwrap_or(0.0),
                tokens_per_correct: ratio(total as f64, acc.stat.correct_count as f64),
                cost_usd: acc.cost,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total_tokens.cmp(&a.total_tokens));
    rows
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    /// Means over models of each model's per-record averages.
    pub mean_tokens_per_record: f64,
    pub mean_input_per_record: f64,
    pub mean_output_per_record: f64,
    /// Input to output ratio; `None` when no output tokens were recorded.
    pub input_output_ratio: Option<f64>,
    pub most_efficient_model: Option<String>,
}

pub fn token_summary(rows: &[TokenStat]) -> TokenSummary {
    let populated: Vec<&TokenStat> = rows.iter().filter(|r| r.count > 0).collect();
    let models = populated.len() as f64;
    let mean_of = |f: &dyn Fn(&TokenStat) -> f64| {
        if populated.is_empty() {
            0.0
        } else {
            populated.iter().map(|r| f(r)).sum::<f64>() / models
        }
    };
    let mean_tokens = mean_of(&|r: &TokenStat| r.total_tokens as f64 / r.count as f64);
    let mean_input = mean_of(&|r: &TokenStat| r.input_tokens as f64 / r.count as f64);
    let mean_output = mean_of(&|r: &TokenStat| r.output_tokens as f64 / r.count as f64);
    TokenSummary {
        total_tokens: rows.iter().fold(0u64, |sum, r| sum.saturating_add(r.total_tokens)),
        total_cost_usd: rows.iter().map(|r| r.cost_usd).sum(),
        mean_tokens_per_record: mean_tokens,
        mean_input_per_record: mean_input,
        mean_output_per_record: mean_output,
        input_output_ratio: ratio(mean_input, mean_output),
        most_efficient_model: most_efficient(rows).map(|r| r.model.clone()),
    }
}

/// Lowest tokens per correct answer; models with no correct answer never win.
pub fn most_efficient(rows: &[TokenStat]) -> Option<&TokenStat> {
    rows.iter()
        .filter_map(|r| r.tokens_per_correct.map(|tpc| (r, tpc)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(r, _)| r)
}
