use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    aggregate::{
        breakdown::{law_breakdown, test_extremes, test_set_stats, LawBreakdown, TestExtremes, TestSetStat},
        difficulty::{
            bin_distribution, bin_summaries, model_accuracy_by_bin, question_stats, subject_difficulty, BinSummary,
            DifficultyBin, SubjectDifficulty,
        },
        errors::{common_failures, error_overlap, error_population, missed_questions, CommonFailures, ErrorOverlapMatrix, MissedQuestion},
        group_by, keys, model_subject_heatmap, model_test_heatmap, questions_per_year, subject_ranking,
        timing::{time_stats, time_summary, TimeStat, TimeSummary},
        tokens::{token_stats, token_summary, TokenStat, TokenSummary},
        year_series, AggregateStat, GroupRow, Heatmap, YearQuestions,
    },
    config::AnalysisConfig,
    error::{Dimension, EmptyGroupWarning, Error, Result},
    filter::FilterCriteria,
    ranking::{composite_scores, highlights, model_rankings, overview, CompositeScore, Highlights, ModelRanking, OverviewInsight},
    record::EvaluationRecord,
    state::AppState,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViewKind {
    Overview,
    Model,
    Time,
    Law,
    Subject,
    Year,
    Error,
    Difficulty,
    Token,
    TestSet,
    Composite,
}

impl ViewKind {
    pub fn parse(name: &str) -> Result<ViewKind> {
        name.parse::<ViewKind>()
            .map_err(|_| Error::UnknownView(name.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverviewReport {
    pub insight: OverviewInsight,
    pub highlights: Highlights,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub rankings: Vec<GroupRow<String>>,
    pub heatmap: Heatmap,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeReport {
    pub stats: Vec<TimeStat>,
    pub summary: TimeSummary,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LawReport {
    pub breakdown: LawBreakdown,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubjectReport {
    pub subjects: Vec<GroupRow<String>>,
    /// Model × subject accuracy.
    pub heatmap: Heatmap,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YearReport {
    pub years: Vec<GroupRow<i32>>,
    pub questions: Vec<YearQuestions>,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub overlap: ErrorOverlapMatrix,
    pub most_missed: Vec<MissedQuestion>,
    pub common: CommonFailures,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyReport {
    pub distribution: IndexMap<DifficultyBin, usize>,
    pub bins: Vec<BinSummary>,
    pub by_model: IndexMap<String, IndexMap<DifficultyBin, AggregateStat>>,
    pub subjects: Vec<SubjectDifficulty>,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenReport {
    pub stats: Vec<TokenStat>,
    pub summary: TokenSummary,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestSetReport {
    pub tests: Vec<TestSetStat>,
    pub extremes: TestExtremes,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeReport {
    pub rankings: Vec<ModelRanking>,
    pub scores: Vec<CompositeScore>,
    pub warnings: Vec<EmptyGroupWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", content = "report", rename_all = "snake_case")]
pub enum ViewReport {
    Overview(OverviewReport),
    Model(ModelReport),
    Time(TimeReport),
    Law(LawReport),
    Subject(SubjectReport),
    Year(YearReport),
    Error(ErrorReport),
    Difficulty(DifficultyReport),
    Token(TokenReport),
    TestSet(TestSetReport),
    Composite(CompositeReport),
}

impl ViewReport {
    pub fn kind(&self) -> ViewKind {
        match self {
            ViewReport::Overview(_) => ViewKind::Overview,
            ViewReport::Model(_) => ViewKind::Model,
            ViewReport::Time(_) => ViewKind::Time,
            ViewReport::Law(_) => ViewKind::Law,
            ViewReport::Subject(_) => ViewKind::Subject,
            ViewReport::Year(_) => ViewKind::Year,
            ViewReport::Error(_) => ViewKind::Error,
            ViewReport::Difficulty(_) => ViewKind::Difficulty,
            ViewReport::Token(_) => ViewKind::Token,
            ViewReport::TestSet(_) => ViewKind::TestSet,
            ViewReport::Composite(_) => ViewKind::Composite,
        }
    }

    pub fn warnings(&self) -> &[EmptyGroupWarning] {
        match self {
            ViewReport::Overview(r) => &r.warnings,
            ViewReport::Model(r) => &r.warnings,
            ViewReport::Time(r) => &r.warnings,
            ViewReport::Law(r) => &r.warnings,
            ViewReport::Subject(r) => &r.warnings,
            ViewReport::Year(r) => &r.warnings,
            ViewReport::Error(r) => &r.warnings,
            ViewReport::Difficulty(r) => &r.warnings,
            ViewReport::Token(r) => &r.warnings,
            ViewReport::TestSet(r) => &r.warnings,
            ViewReport::Composite(r) => &r.warnings,
        }
    }
}

/// Warnings shared by every view: the filter left nothing to aggregate.
fn base_warnings(records: &[&EvaluationRecord], kind: ViewKind) -> Vec<EmptyGroupWarning> {
    if records.is_empty() {
        vec![EmptyGroupWarning::new(
            Dimension::Records,
            format!("no records match the active filter for the {} view", kind),
        )]
    } else {
        Vec::new()
    }
}

fn warn_if(warnings: &mut Vec<EmptyGroupWarning>, condition: bool, dimension: Dimension, detail: &str) {
    if condition {
        warnings.push(EmptyGroupWarning::new(dimension, detail));
    }
}

/// Builds one view over already filtered records.
pub fn build_view(
    kind: ViewKind,
    records: &[&EvaluationRecord],
    criteria: &FilterCriteria,
    config: &AnalysisConfig,
) -> ViewReport {
    let mut warnings = base_warnings(records, kind);
    let has_records = !records.is_empty();
    match kind {
        ViewKind::Overview => ViewReport::Overview(OverviewReport {
            insight: overview(records),
            highlights: highlights(&model_rankings(records)),
            warnings,
        }),
        ViewKind::Model => {
            let groups = group_by(records, keys::model);
            let models: Vec<String> = groups.keys().cloned().collect();
            ViewReport::Model(ModelReport {
                rankings: crate::aggregate::rank_by_accuracy(&groups),
                heatmap: model_test_heatmap(records, &models),
                warnings,
            })
        }
        ViewKind::Time => {
            let stats = time_stats(records);
            warn_if(&mut warnings, has_records && stats.is_empty(), Dimension::ResponseTime, "no record carries a response time");
            ViewReport::Time(TimeReport {
                summary: time_summary(&stats),
                stats,
                warnings,
            })
        }
        ViewKind::Law => ViewReport::Law(LawReport {
            breakdown: law_breakdown(records),
            warnings,
        }),
        ViewKind::Subject => {
            let subjects = subject_ranking(records);
            warn_if(&mut warnings, has_records && subjects.is_empty(), Dimension::Subject, "no record carries a subject");
            let models: Vec<String> = group_by(records, keys::model).keys().cloned().collect();
            ViewReport::Subject(SubjectReport {
                heatmap: model_subject_heatmap(records, &models),
                subjects,
                warnings,
            })
        }
        ViewKind::Year => {
            let years = year_series(records);
            warn_if(&mut warnings, has_records && years.is_empty(), Dimension::Year, "no record carries a year");
            ViewReport::Year(YearReport {
                questions: questions_per_year(records),
                years,
                warnings,
            })
        }
        ViewKind::Error => {
            let population = error_population(records, criteria);
            let overlap = error_overlap(&population);
            warn_if(
                &mut warnings,
                has_records && overlap.models.len() < 2,
                Dimension::ErrorOverlap,
                "error overlap needs at least two models",
            );
            let missed = missed_questions(&population, config.min_attempts);
            warn_if(
                &mut warnings,
                has_records && missed.is_empty(),
                Dimension::CommonFailure,
                "no question has enough attempts",
            );
            let common = common_failures(&missed);
            ViewReport::Error(ErrorReport {
                overlap,
                most_missed: missed.into_iter().take(config.top_error_questions).collect(),
                common,
                warnings,
            })
        }
        ViewKind::Difficulty => {
            let questions = question_stats(records);
            warn_if(&mut warnings, has_records && questions.is_empty(), Dimension::Difficulty, "no question identifiers");
            ViewReport::Difficulty(DifficultyReport {
                distribution: bin_distribution(&questions),
                bins: bin_summaries(&questions),
                by_model: model_accuracy_by_bin(records, &questions),
                subjects: subject_difficulty(&questions),
                warnings,
            })
        }
        ViewKind::Token => {
            let stats = token_stats(records);
            warn_if(&mut warnings, has_records && stats.is_empty(), Dimension::Tokens, "no record carries token counts");
            ViewReport::Token(TokenReport {
                summary: token_summary(&stats),
                stats,
                warnings,
            })
        }
        ViewKind::TestSet => {
            let tests = test_set_stats(records);
            ViewReport::TestSet(TestSetReport {
                extremes: test_extremes(&tests),
                tests,
                warnings,
            })
        }
        ViewKind::Composite => {
            let rankings = model_rankings(records);
            warn_if(&mut warnings, has_records && rankings.is_empty(), Dimension::Model, "no models to score");
            ViewReport::Composite(CompositeReport {
                scores: composite_scores(&rankings, config),
                rankings,
                warnings,
            })
        }
    }
}

impl AppState {
    /// Filters the working set with the active criteria and builds the view.
    pub fn view(&self, kind: ViewKind) -> ViewReport {
        let records = self.filtered();
        build_view(kind, &records, &self.criteria, &self.analysis)
    }

    pub fn all_views(&self) -> Vec<ViewReport> {
        let records = self.filtered();
        ViewKind::iter()
            .map(|kind| build_view(kind, &records, &self.criteria, &self.analysis))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::tests::scenario,
        ensemble::{Ensemble, VotingMethod},
    };

    #[test]
    fn view_names_round_trip_through_strings() {
        assert_eq!(ViewKind::parse("test_set").unwrap(), ViewKind::TestSet);
        assert_eq!(ViewKind::Composite.to_string(), "composite");
        assert!(matches!(ViewKind::parse("charts"), Err(Error::UnknownView(_))));
        assert_eq!(ViewKind::iter().count(), 11);
    }

    #[test]
    fn every_view_is_built_in_order() {
        let state = AppState::new(scenario());
        let reports = state.all_views();
        let kinds: Vec<ViewKind> = reports.iter().map(ViewReport::kind).collect();
        assert_eq!(kinds, ViewKind::iter().collect::<Vec<_>>());
    }

    #[test]
    fn missing_measurements_become_warnings() {
        let state = AppState::new(scenario());
        let ViewReport::Time(time) = state.view(ViewKind::Time) else {
            panic!("expected time report");
        };
        assert!(time.stats.is_empty());
        assert_eq!(time.warnings[0].dimension, Dimension::ResponseTime);

        let report = state.view(ViewKind::Token);
        assert_eq!(report.warnings()[0].dimension, Dimension::Tokens);
    }

    #[test]
    fn empty_filter_result_warns_in_every_view() {
        let mut state = AppState::new(scenario());
        state.set_criteria(FilterCriteria {
            models: ["Z".to_string()].into_iter().collect(),
            ..Default::default()
        });
        for report in state.all_views() {
            assert_eq!(report.warnings().len(), 1, "{}", report.kind());
            assert_eq!(report.warnings()[0].dimension, Dimension::Records);
        }
    }

    #[test]
    fn error_view_ignores_unselected_ensembles() {
        let mut state = AppState::new(scenario());
        state
            .add_ensemble(Ensemble::new("AB", ["A", "B"], VotingMethod::Majority))
            .unwrap();
        let ViewReport::Error(report) = state.view(ViewKind::Error) else {
            panic!("expected error report");
        };
        assert_eq!(report.overlap.models, vec!["A", "B"]);
        assert_eq!(report.overlap.get("A", "B"), Some(50.0));

        let ViewReport::Model(models) = state.view(ViewKind::Model) else {
            panic!("expected model report");
        };
        assert_eq!(models.rankings.len(), 3);
    }

    #[test]
    fn subject_year_and_error_views_carry_breakdowns() {
        let mut records = scenario();
        for (record, (subject, year)) in records
            .iter_mut()
            .zip([("Fire", 2020), ("Law", 2021), ("Fire", 2020), ("Law", 2021)])
        {
            record.subject = Some(subject.to_string());
            record.year = Some(year);
        }
        let state = AppState::new(records);

        let ViewReport::Subject(subjects) = state.view(ViewKind::Subject) else {
            panic!("expected subject report");
        };
        assert_eq!(subjects.heatmap.rows, vec!["A", "B"]);
        assert_eq!(subjects.heatmap.columns, vec!["Fire", "Law"]);
        assert_eq!(subjects.heatmap.cells[0], vec![Some(100.0), Some(0.0)]);
        assert_eq!(subjects.heatmap.cells[1], vec![Some(0.0), Some(0.0)]);

        let ViewReport::Year(years) = state.view(ViewKind::Year) else {
            panic!("expected year report");
        };
        let counts: Vec<(i32, usize)> = years.questions.iter().map(|y| (y.year, y.question_count)).collect();
        assert_eq!(counts, vec![(2020, 1), (2021, 1)]);

        let ViewReport::Error(errors) = state.view(ViewKind::Error) else {
            panic!("expected error report");
        };
        let q2 = &errors.most_missed[0];
        assert_eq!(q2.question, "q2");
        assert_eq!(q2.label, "t / 2021 / Law");
        assert_eq!(q2.incorrect_models, vec!["A", "B"]);
        assert!(q2.correct_models.is_empty());
    }

    #[test]
    fn reports_serialize_with_view_tag() {
        let state = AppState::new(scenario());
        let json = serde_json::to_value(state.view(ViewKind::Law)).unwrap();
        assert_eq!(json["view"], "law");
        assert_eq!(json["report"]["breakdown"]["non_law_questions"], 2);
    }
}
