//! Tolerant parsing of upstream model output into detections.
//!
//! Multimodal models wrap their answer in prose, markdown fences or
//! reasoning blocks. Extraction of the JSON array is lenient; validation of
//! each record is strict. Records without a non-empty `name` string and a
//! numeric `confidence` in `[0, 1]` are dropped without repair.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::error::DetectError;
use super::result::DetectedObject;

/// Parses raw upstream text into validated detections.
pub trait ResponseParser: Send + Sync {
    /// Parser identifier.
    fn name(&self) -> &'static str;

    /// Extract the detections, or fail with `DetectError::Parse` when no
    /// valid record survives.
    fn parse(&self, raw: &str) -> Result<Vec<DetectedObject>, DetectError>;
}

/// How the JSON array is located inside the raw text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Span from the first `[` to the last `]`; whole text when absent.
    #[default]
    FirstBracketSpan,
    /// Drops `<think>` blocks, prefers a `json` or untagged fenced block,
    /// then falls back to the bracket span.
    FencedBlock,
}

impl std::str::FromStr for ExtractionStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bracket" | "first-bracket-span" => Ok(Self::FirstBracketSpan),
            "fenced" | "fenced-block" => Ok(Self::FencedBlock),
            other => Err(format!(
                "unknown extraction strategy '{}'; expected bracket or fenced",
                other
            )),
        }
    }
}

/// Validated detections plus the number of records that were discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseReport {
    pub objects: Vec<DetectedObject>,
    pub dropped: usize,
}

#[derive(Clone, Debug, Default)]
pub struct JsonArrayParser {
    strategy: ExtractionStrategy,
}

impl JsonArrayParser {
    pub fn new(strategy: ExtractionStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    pub fn parse_with_report(&self, raw: &str) -> Result<ParseReport, DetectError> {
        let candidate = match self.strategy {
            ExtractionStrategy::FirstBracketSpan => bracket_span(raw).unwrap_or(raw),
            ExtractionStrategy::FencedBlock => return self.parse_fenced(raw),
        };
        decode_records(candidate)
    }

    fn parse_fenced(&self, raw: &str) -> Result<ParseReport, DetectError> {
        let stripped = think_block_re().replace_all(raw, "");
        let text: &str = &stripped;
        let spanned = bracket_span(text).unwrap_or(text);
        let Some(block) = json_fence(text) else {
            return decode_records(spanned);
        };
        decode_records(bracket_span(block).unwrap_or(block)).or_else(|err| {
            log::debug!("fenced block rejected ({}); retrying bracket span", err);
            decode_records(spanned)
        })
    }
}

impl ResponseParser for JsonArrayParser {
    fn name(&self) -> &'static str {
        match self.strategy {
            ExtractionStrategy::FirstBracketSpan => "json-array",
            ExtractionStrategy::FencedBlock => "json-array-fenced",
        }
    }

    fn parse(&self, raw: &str) -> Result<Vec<DetectedObject>, DetectError> {
        let report = self.parse_with_report(raw)?;
        if report.dropped > 0 {
            log::debug!(
                "discarded {} malformed detection record(s), kept {}",
                report.dropped,
                report.objects.len()
            );
        }
        Ok(report.objects)
    }
}

fn bracket_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").unwrap())
}

fn think_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap())
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([A-Za-z]*)\s*(.*?)```").unwrap())
}

fn bracket_span(text: &str) -> Option<&str> {
    bracket_span_re().find(text).map(|m| m.as_str())
}

/// First non-empty fenced block tagged `json` or left untagged.
fn json_fence(text: &str) -> Option<&str> {
    fenced_block_re()
        .captures_iter(text)
        .filter(|caps| {
            let tag = caps.get(1).map_or("", |m| m.as_str());
            tag.is_empty() || tag.eq_ignore_ascii_case("json")
        })
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().trim())
        .find(|block| !block.is_empty())
}

fn decode_records(candidate: &str) -> Result<ParseReport, DetectError> {
    let value: Value = serde_json::from_str(candidate.trim())
        .map_err(|e| DetectError::parse(format!("invalid JSON: {}", e)))?;
    let Value::Array(records) = value else {
        return Err(DetectError::parse("response is not an array"));
    };

    let total = records.len();
    let objects: Vec<DetectedObject> = records.iter().filter_map(record_to_object).collect();
    if objects.is_empty() {
        return Err(DetectError::parse("no valid objects detected"));
    }
    Ok(ParseReport {
        dropped: total - objects.len(),
        objects,
    })
}

fn record_to_object(record: &Value) -> Option<DetectedObject> {
    let map = record.as_object()?;
    let name = map.get("name")?.as_str()?;
    let confidence = map.get("confidence")?.as_f64()?;
    DetectedObject::new(name, confidence)
}
