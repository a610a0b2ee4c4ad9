// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Append-only result logs and their CSV summaries.
//!
//! One entry per configuration:
//!
//! ```text
//! layer=3, model=gpt2, 多被试结果:
//! 平均值: 0.1234 ± 0.0100
//! 范围: [0.1000, 0.1500]
//! 中位数: 0.1200
//!
//! ```

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use voxfit_core::{SummaryStats, VoxfitError};

const MULTI_SUBJECT_MARKER: &str = "多被试结果:";
const MEAN_PREFIX: &str = "平均值:";
const RANGE_PREFIX: &str = "范围:";
const MEDIAN_PREFIX: &str = "中位数:";

/// A header of `key=value` tags followed by summary statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub tags: Vec<(String, String)>,
    /// Whether the header ends with the multi-subject marker.
    pub multi_subject: bool,
    pub stats: SummaryStats,
}

impl LogEntry {
    pub fn new(tags: Vec<(String, String)>, stats: SummaryStats) -> Self {
        Self {
            tags,
            multi_subject: true,
            stats,
        }
    }

    pub fn for_layer(layer: usize, stats: SummaryStats) -> Self {
        Self::new(vec![("layer".to_string(), layer.to_string())], stats)
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        out.push_str(&header.join(", "));
        if self.multi_subject {
            if !header.is_empty() {
                out.push_str(", ");
            }
            out.push_str(MULTI_SUBJECT_MARKER);
        }
        out.push('\n');
        let s = &self.stats;
        out.push_str(&format!(
            "{MEAN_PREFIX} {:.4} ± {:.4}\n{RANGE_PREFIX} [{:.4}, {:.4}]\n{MEDIAN_PREFIX} {:.4}\n\n",
            s.mean, s.std, s.min, s.max, s.median
        ));
        out
    }
}

/// Appends one rendered entry, creating the file and parent directories.
///
/// Existing content is never rewritten.
pub fn append_log(path: &Path, entry: &LogEntry) -> Result<(), VoxfitError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(entry.render().as_bytes())?;
    file.flush()?;
    Ok(())
}

fn parse_number(text: &str, line_no: usize) -> Result<f64, VoxfitError> {
    text.trim().parse::<f64>().map_err(|_| {
        VoxfitError::invalid_input(format!("log line {line_no}: '{}' is not a number", text.trim()))
    })
}

fn strip_line<'a>(line: &'a str, prefix: &str, line_no: usize) -> Result<&'a str, VoxfitError> {
    line.trim()
        .strip_prefix(prefix)
        .ok_or_else(|| VoxfitError::invalid_input(format!("log line {line_no}: expected '{prefix}'")))
}

fn parse_header(line: &str, line_no: usize) -> Result<(Vec<(String, String)>, bool), VoxfitError> {
    let mut text = line.trim();
    let multi_subject = match text.strip_suffix(MULTI_SUBJECT_MARKER) {
        Some(rest) => {
            text = rest.trim_end().trim_end_matches(',').trim_end();
            true
        }
        None => false,
    };
    let mut tags = Vec::new();
    for part in text.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (key, value) = part.split_once('=').ok_or_else(|| {
            VoxfitError::invalid_input(format!(
                "log line {line_no}: header tag '{part}' is not key=value"
            ))
        })?;
        tags.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok((tags, multi_subject))
}

/// Recovers every entry from a log written by [`append_log`].
pub fn parse_log(text: &str) -> Result<Vec<LogEntry>, VoxfitError> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();
    if lines.len() % 4 != 0 {
        return Err(VoxfitError::invalid_input(format!(
            "log has {} non-empty lines; entries are 4 lines each",
            lines.len()
        )));
    }

    let mut entries = Vec::with_capacity(lines.len() / 4);
    for block in lines.chunks(4) {
        let (header_no, header) = block[0];
        let (tags, multi_subject) = parse_header(header, header_no)?;

        let (mean_no, mean_line) = block[1];
        let (mean, std) = strip_line(mean_line, MEAN_PREFIX, mean_no)?
            .split_once('±')
            .ok_or_else(|| VoxfitError::invalid_input(format!("log line {mean_no}: missing '±'")))?;

        let (range_no, range_line) = block[2];
        let range = strip_line(range_line, RANGE_PREFIX, range_no)?
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| VoxfitError::invalid_input(format!("log line {range_no}: expected [min, max]")))?;
        let (min, max) = range
            .split_once(',')
            .ok_or_else(|| VoxfitError::invalid_input(format!("log line {range_no}: expected [min, max]")))?;

        let (median_no, median_line) = block[3];
        let median = strip_line(median_line, MEDIAN_PREFIX, median_no)?;

        entries.push(LogEntry {
            tags,
            multi_subject,
            stats: SummaryStats {
                mean: parse_number(mean, mean_no)?,
                std: parse_number(std, mean_no)?,
                min: parse_number(min, range_no)?,
                max: parse_number(max, range_no)?,
                median: parse_number(median, median_no)?,
            },
        });
    }
    Ok(entries)
}

/// Flat row for tabular summaries of parsed logs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SummaryRow {
    pub source: String,
    pub model: String,
    pub layer: Option<usize>,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl SummaryRow {
    pub fn from_entry(source: &str, entry: &LogEntry) -> Self {
        Self {
            source: source.to_string(),
            model: entry.tag("model").unwrap_or(source).to_string(),
            layer: entry.tag("layer").and_then(|layer| layer.parse().ok()),
            mean: entry.stats.mean,
            std: entry.stats.std,
            min: entry.stats.min,
            max: entry.stats.max,
            median: entry.stats.median,
        }
    }
}

/// Writes rows with a header line, replacing `path`.
pub fn write_summary_csv(path: &Path, rows: &[SummaryRow]) -> Result<(), VoxfitError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(csv_to_io)?;
    for row in rows {
        writer.serialize(row).map_err(csv_to_io)?;
    }
    writer.flush()?;
    Ok(())
}

/// Rows of the entry with the highest mean per model, in model order.
pub fn best_per_model(rows: &[SummaryRow]) -> Vec<SummaryRow> {
    let mut best: Vec<SummaryRow> = Vec::new();
    for row in rows {
        match best.iter_mut().find(|b| b.model == row.model) {
            Some(current) if row.mean > current.mean => *current = row.clone(),
            Some(_) => {}
            None => best.push(row.clone()),
        }
    }
    best.sort_by(|a, b| a.model.cmp(&b.model));
    best
}

fn csv_to_io(err: csv::Error) -> VoxfitError {
    VoxfitError::Io(std::io::Error::other(err))
}
