use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// A run of word characters directly followed by terminal punctuation.
// Known approximation: misses sentences closed by quotes or parentheses
// and counts abbreviations such as "Mr." as sentences.
static SENTENCE_END_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+[.!?]").expect("valid sentence regex"));

static WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// How many entries `most_common_words` reports.
pub const MOST_COMMON_LIMIT: usize = 5;

/// The statistics the analyzer knows how to compute, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analysis {
    WordCount,
    CharCount,
    SentenceCount,
    AvgWordLength,
    MostCommonWords,
}

impl Analysis {
    pub const ALL: [Analysis; 5] = [
        Analysis::WordCount,
        Analysis::CharCount,
        Analysis::SentenceCount,
        Analysis::AvgWordLength,
        Analysis::MostCommonWords,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Analysis::WordCount => "word_count",
            Analysis::CharCount => "char_count",
            Analysis::SentenceCount => "sentence_count",
            Analysis::AvgWordLength => "avg_word_length",
            Analysis::MostCommonWords => "most_common_words",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn run(self, text: &str) -> AnalysisValue {
        match self {
            Analysis::WordCount => AnalysisValue::Count(word_count(text)),
            Analysis::CharCount => AnalysisValue::Count(char_count(text)),
            Analysis::SentenceCount => AnalysisValue::Count(sentence_count(text)),
            // No tokens reports a plain zero rather than a mean
            Analysis::AvgWordLength => match avg_word_length(text) {
                Some(mean) => AnalysisValue::Mean(mean),
                None => AnalysisValue::Count(0),
            },
            Analysis::MostCommonWords => {
                AnalysisValue::Words(most_common_words(text, MOST_COMMON_LIMIT))
            }
        }
    }
}

fn recognized_names() -> String {
    Analysis::ALL
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Requested analysis: one statistic, or every statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    All,
    Single(Analysis),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid analysis type. Choose from: {}, or 'all'.", recognized_names())]
pub struct InvalidAnalysisType {
    pub requested: String,
}

impl std::str::FromStr for AnalysisMode {
    type Err = InvalidAnalysisType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(AnalysisMode::All);
        }
        Analysis::from_name(s)
            .map(AnalysisMode::Single)
            .ok_or_else(|| InvalidAnalysisType {
                requested: s.to_string(),
            })
    }
}

impl AnalysisMode {
    pub fn analyses(self) -> Vec<Analysis> {
        match self {
            AnalysisMode::All => Analysis::ALL.to_vec(),
            AnalysisMode::Single(analysis) => vec![analysis],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisValue {
    Count(usize),
    Mean(f64),
    Words(Vec<(String, usize)>),
}

impl fmt::Display for AnalysisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisValue::Count(n) => write!(f, "{}", n),
            // Whole means keep one fractional digit: 4.0, not 4
            AnalysisValue::Mean(m) if m.is_finite() && m.fract() == 0.0 => write!(f, "{:.1}", m),
            AnalysisValue::Mean(m) => write!(f, "{}", m),
            AnalysisValue::Words(words) => {
                let items = words
                    .iter()
                    .map(|(word, count)| format!("('{}', {})", word, count))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{}]", items)
            }
        }
    }
}

/// Computed statistics in the order they were requested.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub entries: Vec<(Analysis, AnalysisValue)>,
}

impl AnalysisResult {
    pub fn get(&self, analysis: Analysis) -> Option<&AnalysisValue> {
        self.entries
            .iter()
            .find(|(a, _)| *a == analysis)
            .map(|(_, v)| v)
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .entries
            .iter()
            .map(|(analysis, value)| format!("{}: {}", analysis.name(), value))
            .collect::<Vec<_>>();
        f.write_str(&lines.join("\n"))
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

pub fn sentence_count(text: &str) -> usize {
    SENTENCE_END_REGEX.find_iter(text).count()
}

/// Mean token length in characters, `None` when there are no tokens.
pub fn avg_word_length(text: &str) -> Option<f64> {
    let (tokens, total) = text
        .split_whitespace()
        .fold((0usize, 0usize), |(n, len), w| (n + 1, len + w.chars().count()));
    if tokens == 0 {
        return None;
    }
    Some(total as f64 / tokens as f64)
}

/// Top `n` lower-cased words by frequency. Ties keep first-seen order.
pub fn most_common_words(text: &str, n: usize) -> Vec<(String, usize)> {
    let lowered = text.to_lowercase();
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for m in WORD_REGEX.find_iter(&lowered) {
        match slots.get(m.as_str()) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(m.as_str(), counts.len());
                counts.push((m.as_str().to_string(), 1));
            }
        }
    }

    // stable sort
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
}

/// Trims `text` and computes the statistics selected by `mode`.
pub fn run_analysis(text: &str, mode: &str) -> Result<AnalysisResult, InvalidAnalysisType> {
    let mode: AnalysisMode = mode.parse()?;
    let text = text.trim();
    let entries = mode
        .analyses()
        .into_iter()
        .map(|analysis| (analysis, analysis.run(text)))
        .collect();
    Ok(AnalysisResult { entries })
}

/// String form of [`run_analysis`]; an unknown mode yields the usage message.
pub fn analyze(text: &str, mode: &str) -> String {
    match run_analysis(text, mode) {
        Ok(result) => result.to_string(),
        Err(e) => e.to_string(),
    }
}
