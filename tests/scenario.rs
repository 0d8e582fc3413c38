use std::io::Write;

use bench_insight::{
    aggregate::{
        difficulty::{DifficultyBin, QuestionStat},
        timing::summarize,
        AggregateStat,
    },
    ingest, AppState, ConfigurationError, Ensemble, Error, EvaluationRecord, FilterCriteria, ReportConfig, ViewKind,
    ViewReport, VotingMethod,
};

fn scenario() -> Vec<EvaluationRecord> {
    vec![
        EvaluationRecord::new("A", "t", "q1", true),
        EvaluationRecord::new("A", "t", "q2", false),
        EvaluationRecord::new("B", "t", "q1", false),
        EvaluationRecord::new("B", "t", "q2", false),
    ]
}

#[test]
fn two_model_scenario() {
    let state = AppState::new(scenario());

    let ViewReport::Model(models) = state.view(ViewKind::Model) else {
        panic!("expected model report");
    };
    assert_eq!(models.rankings[0].key, "A");
    assert_eq!(models.rankings[0].count, 2);
    assert_eq!(models.rankings[0].accuracy, 50.0);
    assert_eq!(models.rankings[1].accuracy, 0.0);

    let ViewReport::Error(errors) = state.view(ViewKind::Error) else {
        panic!("expected error report");
    };
    assert_eq!(errors.overlap.get("A", "B"), Some(50.0));
    assert_eq!(errors.common.universal.len(), 1);
    assert_eq!(errors.common.universal[0].question, "q2");
    assert_eq!(errors.common.majority.len(), 2);
}

#[test]
fn majority_ensemble_ties_are_wrong() {
    let mut state = AppState::new(scenario());
    state
        .add_ensemble(Ensemble::new("AB", ["A", "B"], VotingMethod::Majority))
        .unwrap();
    let synthetic = state.synthetic_records();
    assert_eq!(synthetic.len(), 2);
    assert!(synthetic.iter().all(|r| !r.is_correct));

    state.set_criteria(FilterCriteria {
        models: ["AB".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let ViewReport::Overview(overview) = state.view(ViewKind::Overview) else {
        panic!("expected overview report");
    };
    assert_eq!(overview.insight.model_count, 1);
    assert_eq!(overview.insight.mean_accuracy, 0.0);
}

#[test]
fn median_and_exact_bin_edges() {
    assert_eq!(summarize(&[1.0, 2.0, 3.0, 4.0]).map(|s| s.median), Some(3.0));

    let question = QuestionStat {
        question: "q".to_string(),
        test_name: "t".to_string(),
        subject: None,
        year: None,
        session: None,
        stat: AggregateStat { count: 5, correct_count: 4 },
    };
    assert_eq!(question.bin(), DifficultyBin::VeryEasy);
}

#[test]
fn invalid_config_ensemble_is_rejected() {
    let config = ReportConfig {
        ensembles: vec![Ensemble::new("A", ["A", "B"], VotingMethod::Majority)],
        ..Default::default()
    };
    let err = AppState::from_config(scenario(), config).unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::NameCollidesWithModel(_))
    ));
}

#[test]
fn files_to_reports() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("A_detailed_CoT_exam.csv");
    let mut csv = std::fs::File::create(&csv_path).unwrap();
    writeln!(csv, "ID,Question,Subject,Year,정답여부,law,문제당평균시간(초)").unwrap();
    writeln!(csv, "1,q1,Fire,2020,True,O,1.5").unwrap();
    writeln!(csv, "2,q2,Law,2021,False,,2.5").unwrap();
    drop(csv);

    let jsonl_path = dir.path().join("B_detailed_CoT_exam.jsonl");
    let mut jsonl = std::fs::File::create(&jsonl_path).unwrap();
    writeln!(jsonl, r#"{{"ID": 1, "Question": "q1", "Subject": "Fire", "Year": 2020, "정답여부": true, "law": "O"}}"#).unwrap();
    writeln!(jsonl, r#"{{"ID": 2, "Question": "q2", "Subject": "Law", "Year": 2021, "정답여부": "True"}}"#).unwrap();
    drop(jsonl);

    let mut records = ingest::load_records(&csv_path).unwrap();
    records.extend(ingest::load_records(&jsonl_path).unwrap());
    assert_eq!(records.len(), 4);

    let state = AppState::new(records);
    let reports = state.all_views();
    assert_eq!(reports.len(), 11);

    let ViewReport::Time(time) = state.view(ViewKind::Time) else {
        panic!("expected time report");
    };
    assert_eq!(time.stats.len(), 1);
    assert_eq!(time.stats[0].model, "A");
    assert_eq!(time.stats[0].median, 2.5);

    let ViewReport::Year(years) = state.view(ViewKind::Year) else {
        panic!("expected year report");
    };
    assert_eq!(years.years.iter().map(|r| r.key).collect::<Vec<_>>(), vec![2020, 2021]);

    let json = serde_json::to_value(&reports).unwrap();
    assert_eq!(json[0]["view"], "overview");
    assert_eq!(json[0]["report"]["insight"]["total_questions"], 2);
}
