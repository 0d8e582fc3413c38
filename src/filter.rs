use std::borrow::Borrow;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::record::EvaluationRecord;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProblemType {
    #[default]
    All,
    TextOnly,
    ImageOnly,
}

impl ProblemType {
    pub fn admits(&self, record: &EvaluationRecord) -> bool {
        match self {
            ProblemType::All => true,
            ProblemType::TextOnly => !record.has_image,
            ProblemType::ImageOnly => record.has_image,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LawType {
    #[default]
    All,
    LawOnly,
    NonLawOnly,
}

impl LawType {
    pub fn admits(&self, record: &EvaluationRecord) -> bool {
        match self {
            LawType::All => true,
            LawType::LawOnly => record.is_law_related,
            LawType::NonLawOnly => !record.is_law_related,
        }
    }
}

/// Active restrictions. An empty set means "no restriction" on that
/// dimension, so clearing a picker never empties the result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub tests: IndexSet<String>,
    pub models: IndexSet<String>,
    pub detail_levels: IndexSet<String>,
    pub prompting_styles: IndexSet<String>,
    pub years: IndexSet<i32>,
    pub sessions: IndexSet<String>,
    pub problem_type: ProblemType,
    pub law_type: LawType,
}

fn allows(set: &IndexSet<String>, value: &str) -> bool {
    set.is_empty() || set.contains(value)
}

fn allows_optional<T, Q>(set: &IndexSet<T>, value: Option<&Q>) -> bool
where
    T: Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if set.is_empty() {
        return true;
    }
    match value {
        Some(value) => set.contains(value),
        None => false,
    }
}

impl FilterCriteria {
    pub fn is_unrestricted(&self) -> bool {
        *self == FilterCriteria::default()
    }

    pub fn matches(&self, record: &EvaluationRecord) -> bool {
        allows(&self.tests, &record.test_name)
            && allows(&self.models, &record.model)
            && allows(&self.detail_levels, &record.detail_level)
            && allows(&self.prompting_styles, &record.prompting_style)
            && allows_optional(&self.years, record.year.as_ref())
            && allows_optional(&self.sessions, record.session.as_deref())
            && self.problem_type.admits(record)
            && self.law_type.admits(record)
    }

    /// True when the model was picked by name, as opposed to being admitted
    /// by an empty model selection.
    pub fn explicitly_selects_model(&self, model: &str) -> bool {
        self.models.contains(model)
    }
}

/// Returns the records passing every active restriction, in input order.
pub fn apply<'a, I>(records: I, criteria: &FilterCriteria) -> Vec<&'a EvaluationRecord>
where
    I: IntoIterator<Item = &'a EvaluationRecord>,
{
    let mut seen = 0usize;
    let filtered: Vec<&EvaluationRecord> = records
        .into_iter()
        .inspect(|_| seen += 1)
        .filter(|record| criteria.matches(record))
        .collect();
    log::debug!("Filter kept {} of {} records", filtered.len(), seen);
    filtered
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StringDimension {
    Test,
    Model,
    DetailLevel,
    PromptingStyle,
    Session,
    Subject,
}

impl StringDimension {
    pub fn value_of<'a>(&self, record: &'a EvaluationRecord) -> Option<&'a str> {
        match self {
            StringDimension::Test => Some(&record.test_name),
            StringDimension::Model => Some(&record.model),
            StringDimension::DetailLevel => Some(&record.detail_level),
            StringDimension::PromptingStyle => Some(&record.prompting_style),
            StringDimension::Session => record.session.as_deref(),
            StringDimension::Subject => record.subject.as_deref(),
        }
    }
}

/// Distinct values of a dimension in first-seen order.
pub fn available_values<R: Borrow<EvaluationRecord>>(records: &[R], dimension: StringDimension) -> Vec<String> {
    let values: IndexSet<&str> = records
        .iter()
        .filter_map(|record| {
            let record: &EvaluationRecord = record.borrow();
            dimension.value_of(record)
        })
        .filter(|value| !value.is_empty())
        .collect();
    values.into_iter().map(str::to_string).collect()
}

pub fn available_years<R: Borrow<EvaluationRecord>>(records: &[R]) -> Vec<i32> {
    let mut years: Vec<i32> = records
        .iter()
        .filter_map(|record| {
            let record: &EvaluationRecord = record.borrow();
            record.year
        })
        .collect::<IndexSet<i32>>()
        .into_iter()
        .collect();
    years.sort_unstable();
    years
}
