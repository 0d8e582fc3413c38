use serde::{Deserialize, Serialize};

pub const DEFAULT_DETAIL_LEVEL: &str = "detailed";
pub const DEFAULT_PROMPTING_STYLE: &str = "no_prompting";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    #[default]
    Measured,
    Ensemble,
}

/// One model's attempt at one question. Flags are already normalized by the
/// ingestion layer; nothing in the core coerces them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: String,
    pub model: String,
    pub test_name: String,
    pub detail_level: String,
    pub prompting_style: String,
    pub year: Option<i32>,
    pub session: Option<String>,
    pub subject: Option<String>,
    pub question: String,
    pub is_correct: bool,
    pub is_law_related: bool,
    pub has_image: bool,
    pub response_time_seconds: Option<f64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    #[serde(default)]
    pub origin: RecordOrigin,
}

impl EvaluationRecord {
    pub fn new(
        model: impl Into<String>,
        test_name: impl Into<String>,
        question: impl Into<String>,
        is_correct: bool,
    ) -> Self {
        let question = question.into();
        EvaluationRecord {
            id: question.clone(),
            model: model.into(),
            test_name: test_name.into(),
            detail_level: DEFAULT_DETAIL_LEVEL.to_string(),
            prompting_style: DEFAULT_PROMPTING_STYLE.to_string(),
            year: None,
            session: None,
            subject: None,
            question,
            is_correct,
            is_law_related: false,
            has_image: false,
            response_time_seconds: None,
            input_tokens: None,
            output_tokens: None,
            cost_usd: None,
            origin: RecordOrigin::Measured,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == RecordOrigin::Ensemble
    }

    /// Input plus output tokens, or `None` when neither was recorded.
    pub fn total_tokens(&self) -> Option<u64> {
        match (self.input_tokens, self.output_tokens) {
            (None, None) => None,
            (input, output) => Some(input.unwrap_or(0).saturating_add(output.unwrap_or(0))),
        }
    }

    pub fn has_token_data(&self) -> bool {
        self.input_tokens.is_some() || self.output_tokens.is_some()
    }
}
