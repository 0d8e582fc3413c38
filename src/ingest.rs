//! Turns raw result files into `EvaluationRecord`s. All coercion of loosely
//! typed cells happens here.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::{
    error::{Error, Result},
    record::{EvaluationRecord, RecordOrigin, DEFAULT_DETAIL_LEVEL, DEFAULT_PROMPTING_STYLE},
};

pub const UNKNOWN: &str = "Unknown";

/// Source column headers.
pub mod columns {
    pub const ID: &str = "ID";
    pub const QUESTION: &str = "Question";
    pub const SUBJECT: &str = "Subject";
    pub const YEAR: &str = "Year";
    pub const SESSION: &str = "Session";
    pub const IS_CORRECT: &str = "정답여부";
    pub const LAW: &str = "law";
    pub const IMAGE: &str = "image";
    pub const RESPONSE_TIME: &str = "문제당평균시간(초)";
    pub const INPUT_TOKENS: &str = "입력토큰";
    pub const OUTPUT_TOKENS: &str = "출력토큰";
    pub const COST: &str = "비용($)";
    pub const MODEL: &str = "모델명";
    pub const TEST_NAME: &str = "Test Name";
    pub const DETAIL_LEVEL: &str = "상세도";
    pub const PROMPTING_STYLE: &str = "프롬프팅";
}

lazy_static! {
    static ref THOUSANDS: Regex = Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").unwrap();
    static ref RESULT_EXTENSION: Regex = Regex::new(r"(?i)\.(csv|jsonl|json)$").unwrap();
}

/// Correctness as the result files encode it: `true`, `1`, `"True"`,
/// `"true"` or `"1"`. Anything else is false.
pub fn parse_boolish_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => matches!(s.trim(), "True" | "true" | "1"),
        _ => false,
    }
}

pub fn parse_law_marker(value: Option<&Value>) -> bool {
    value.and_then(cell_text).as_deref() == Some("O")
}

pub fn parse_image_marker(value: Option<&Value>) -> bool {
    match value.and_then(cell_text) {
        Some(marker) => marker != "text_only",
        None => false,
    }
}

/// Trimmed text of a cell; `None` for null or blank.
fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if THOUSANDS.is_match(s) {
                s.replace(',', "").parse().ok()
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_count(value: &Value) -> Option<u64> {
    parse_number(value)
        .filter(|n| *n >= 0.0)
        .map(|n| n.trunc() as u64)
}

fn parse_year(value: &Value) -> Option<i32> {
    parse_number(value).map(|n| n.trunc() as i32)
}

/// Sessions are labels, but numeric ones are written as `1`, `1.0` or `"1"`
/// depending on the exporter. Integral values collapse to one spelling.
fn parse_session(value: &Value) -> Option<String> {
    match parse_number(value) {
        Some(n) if n.fract() == 0.0 => Some(format!("{}", n as i64)),
        _ => cell_text(value),
    }
}

/// Metadata encoded in a result file name: `model_detail_prompting_test.csv`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetadata {
    pub model: String,
    pub detail_level: String,
    pub prompting_style: String,
    pub test_name: String,
}

impl FileMetadata {
    pub fn from_file_name(file_name: &str) -> Self {
        let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
        let stem = RESULT_EXTENSION.replace(base, "");
        let mut parts: Vec<&str> = stem.split('_').collect();
        // The default prompting style itself contains an underscore.
        if parts.get(2..4) == Some(&["no", "prompting"][..]) {
            parts[2] = DEFAULT_PROMPTING_STYLE;
            parts.remove(3);
        }
        let part = |i: usize, default: &str| {
            parts
                .get(i)
                .filter(|p| !p.is_empty())
                .map_or_else(|| default.to_string(), |p| p.to_string())
        };
        let test_name = parts.get(3..).map(|rest| rest.join("_")).unwrap_or_default();
        FileMetadata {
            model: part(0, UNKNOWN),
            detail_level: part(1, DEFAULT_DETAIL_LEVEL),
            prompting_style: part(2, DEFAULT_PROMPTING_STYLE),
            test_name: if test_name.is_empty() { UNKNOWN.to_string() } else { test_name },
        }
    }
}

/// Builds a record from one row. Columns in the row override the file name
/// metadata. Rows with neither a question nor an id yield `None`. An id is
/// only unique within its file, so a row without a question keeps an empty
/// question and stays out of every per-question analysis.
pub fn record_from_row(row: &Map<String, Value>, metadata: &FileMetadata) -> Option<EvaluationRecord> {
    let text = |column: &str| row.get(column).and_then(cell_text);
    let id = text(columns::ID);
    let question = text(columns::QUESTION);
    let (id, question) = match (id, question) {
        (None, None) => return None,
        (Some(id), None) => (id, String::new()),
        (None, Some(question)) => (question.clone(), question),
        (Some(id), Some(question)) => (id, question),
    };
    let number = |column: &str| row.get(column).and_then(parse_number);
    let count = |column: &str| row.get(column).and_then(parse_count);
    Some(EvaluationRecord {
        id,
        model: text(columns::MODEL).unwrap_or_else(|| metadata.model.clone()),
        test_name: text(columns::TEST_NAME).unwrap_or_else(|| metadata.test_name.clone()),
        detail_level: text(columns::DETAIL_LEVEL).unwrap_or_else(|| metadata.detail_level.clone()),
        prompting_style: text(columns::PROMPTING_STYLE).unwrap_or_else(|| metadata.prompting_style.clone()),
        year: row.get(columns::YEAR).and_then(parse_year),
        session: row.get(columns::SESSION).and_then(parse_session),
        subject: text(columns::SUBJECT),
        question,
        is_correct: row.get(columns::IS_CORRECT).is_some_and(parse_boolish_flag),
        is_law_related: parse_law_marker(row.get(columns::LAW)),
        has_image: parse_image_marker(row.get(columns::IMAGE)),
        response_time_seconds: number(columns::RESPONSE_TIME).filter(|t| *t >= 0.0),
        input_tokens: count(columns::INPUT_TOKENS),
        output_tokens: count(columns::OUTPUT_TOKENS),
        cost_usd: number(columns::COST).filter(|c| *c >= 0.0),
        origin: RecordOrigin::Measured,
    })
}

fn collect_rows<I>(rows: I, metadata: &FileMetadata, path: &Path) -> Vec<EvaluationRecord>
where
    I: IntoIterator<Item = Map<String, Value>>,
{
    let mut skipped = 0usize;
    let records: Vec<EvaluationRecord> = rows
        .into_iter()
        .filter_map(|row| {
            let record = record_from_row(&row, metadata);
            if record.is_none() {
                skipped += 1;
            }
            record
        })
        .collect();
    if skipped > 0 {
        log::warn!(
            "Skipped {} rows without a question or id in {}",
            skipped,
            path.display()
        );
    }
    log::info!("Loaded {} records from {}", records.len(), path.display());
    records
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

/// One JSON object per line. Blank lines are ignored; other non-object lines
/// are skipped with a warning.
pub fn load_json_lines(path: impl AsRef<Path>) -> Result<Vec<EvaluationRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(open(path)?);
    let mut rows = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|source| Error::Json {
            path: path.display().to_string(),
            source,
        })?;
        match value {
            Value::Object(row) => rows.push(row),
            _ => log::warn!(
                "Line {} of {} is not a JSON object, skipping",
                line_number + 1,
                path.display()
            ),
        }
    }
    let metadata = FileMetadata::from_file_name(&path.to_string_lossy());
    Ok(collect_rows(rows, &metadata, path))
}

/// CSV with a header row. Cells are read as text and coerced per column.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<EvaluationRecord>> {
    let path = path.as_ref();
    let csv_error = |source: csv::Error| Error::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(open(path)?);
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.clone(), Value::String(cell.to_string())))
            .collect();
        rows.push(row);
    }
    let metadata = FileMetadata::from_file_name(&path.to_string_lossy());
    Ok(collect_rows(rows, &metadata, path))
}

/// Loads a result file, choosing the reader by extension. Anything other
/// than `.csv` is read as JSON lines.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<EvaluationRecord>> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        load_csv(path)
    } else {
        load_json_lines(path)
    }
}
