use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use encoding_rs::{Encoding, GB18030, UTF_8};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::authors::AuthorityRow;
use crate::config::{AuthorColumns, GlossaryColumns, SegmentColumns};
use crate::evaluate::{Block, SegmentPair};
use crate::terminology::GlossaryRow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Tsv,
    Json,
    Jsonl,
}

impl TableFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => TableFormat::Json,
            "jsonl" | "ndjson" => TableFormat::Jsonl,
            _ => TableFormat::Tsv,
        }
    }
}

/// A header plus string cells. Short rows are padded with empty cells.
#[derive(Clone, Debug)]
pub struct Table {
    pub path: PathBuf,
    pub format: TableFormat,
    pub encoding: &'static str,
    pub sha256: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

/// Provenance of one loaded table, as recorded in the report.
#[derive(Clone, Debug, Serialize)]
pub struct TableInfo {
    pub path: String,
    pub format: TableFormat,
    pub encoding: &'static str,
    pub rows: usize,
    pub sha256: String,
}

impl Table {
    fn new(
        path: &Path,
        format: TableFormat,
        encoding: &'static str,
        sha256: String,
        headers: Vec<String>,
        mut rows: Vec<Vec<String>>,
    ) -> Self {
        for row in &mut rows {
            row.resize(headers.len(), String::new());
        }
        let mut index = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            index.entry(h.clone()).or_insert(i);
        }
        Self {
            path: path.to_path_buf(),
            format,
            encoding,
            sha256,
            headers,
            rows,
            index,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn require_column(&self, name: &str) -> anyhow::Result<usize> {
        self.column(name).ok_or_else(|| {
            anyhow!(
                "{}: missing column {name:?} (have: {})",
                self.path.display(),
                self.headers.join(", ")
            )
        })
    }

    /// Configured columns that this table lacks.
    #[must_use]
    pub fn missing_columns<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        names
            .into_iter()
            .filter(|n| self.column(n).is_none())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn info(&self) -> TableInfo {
        TableInfo {
            path: self.path.display().to_string(),
            format: self.format,
            encoding: self.encoding,
            rows: self.rows.len(),
            sha256: self.sha256.clone(),
        }
    }
}

pub fn read_table(path: &Path) -> anyhow::Result<Table> {
    let bytes = std::fs::read(path).with_context(|| format!("read table: {}", path.display()))?;
    let format = TableFormat::from_path(path);
    parse_table(path, format, &bytes)
}

pub fn parse_table(path: &Path, format: TableFormat, bytes: &[u8]) -> anyhow::Result<Table> {
    let sha256 = fingerprint(bytes);
    let (text, encoding) = decode_text(bytes);
    let (headers, rows) = match format {
        TableFormat::Tsv => parse_tsv(&text),
        TableFormat::Json => parse_json_rows(&text)
            .with_context(|| format!("parse json table: {}", path.display()))?,
        TableFormat::Jsonl => parse_jsonl_rows(&text)
            .with_context(|| format!("parse json-lines table: {}", path.display()))?,
    };
    if headers.is_empty() {
        bail!("{}: table has no header", path.display());
    }
    Ok(Table::new(path, format, encoding, sha256, headers, rows))
}

#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// BOM first, then strict UTF-8, then GB18030 for legacy spreadsheet exports.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, &'static str) {
    if let Some((enc, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = enc.decode_without_bom_handling(&bytes[bom_len..]);
        return (text, enc.name());
    }
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return (text, UTF_8.name());
    }
    let (text, _) = GB18030.decode_without_bom_handling(bytes);
    (text, GB18030.name())
}

type Parsed = (Vec<String>, Vec<Vec<String>>);

fn parse_tsv(text: &str) -> Parsed {
    let mut records = TsvRecords::new(text).filter(|r| r.iter().any(|c| !c.trim().is_empty()));
    let Some(header) = records.next() else {
        return (Vec::new(), Vec::new());
    };
    let headers = header.into_iter().map(|h| h.trim().to_string()).collect();
    (headers, records.collect())
}

/// Tab-separated records with double-quoted fields; tabs, newlines and doubled
/// quotes inside quotes belong to the field.
struct TsvRecords<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> TsvRecords<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
        }
    }
}

impl Iterator for TsvRecords<'_> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Vec<String>> {
        self.chars.peek()?;
        let mut row = Vec::new();
        let mut field = String::new();
        let mut quoted = false;
        let mut in_quotes = false;
        while let Some(c) = self.chars.next() {
            if in_quotes {
                if c == '"' {
                    if self.chars.peek() == Some(&'"') {
                        self.chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    field.push(c);
                }
                continue;
            }
            match c {
                '\t' => {
                    row.push(std::mem::take(&mut field));
                    quoted = false;
                }
                '\n' => break,
                '\r' if self.chars.peek() == Some(&'\n') => {}
                '"' if !quoted && field.trim().is_empty() => {
                    field.clear();
                    quoted = true;
                    in_quotes = true;
                }
                c if quoted && c.is_whitespace() => {}
                c => field.push(c),
            }
        }
        row.push(field);
        Some(row)
    }
}

fn parse_json_rows(text: &str) -> anyhow::Result<Parsed> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let serde_json::Value::Array(items) = value else {
        bail!("expected a top-level array of objects");
    };
    collect_objects(items.into_iter().enumerate())
}

fn parse_jsonl_rows(text: &str) -> anyhow::Result<Parsed> {
    let mut items = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line)
            .with_context(|| format!("line {}", lineno + 1))?;
        items.push((lineno, value));
    }
    collect_objects(items.into_iter())
}

fn collect_objects(
    items: impl Iterator<Item = (usize, serde_json::Value)>,
) -> anyhow::Result<Parsed> {
    let mut headers: Vec<String> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut objects = Vec::new();
    for (pos, item) in items {
        let serde_json::Value::Object(map) = item else {
            bail!("row {pos}: expected an object");
        };
        for key in map.keys() {
            if !seen.contains_key(key) {
                seen.insert(key.clone(), headers.len());
                headers.push(key.clone());
            }
        }
        objects.push(map);
    }
    let rows = objects
        .into_iter()
        .map(|map| {
            let mut row = vec![String::new(); headers.len()];
            for (key, value) in map {
                if let Some(&i) = seen.get(&key) {
                    row[i] = cell_text(value);
                }
            }
            row
        })
        .collect();
    Ok((headers, rows))
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

pub fn glossary_rows(table: &Table, cols: &GlossaryColumns) -> anyhow::Result<Vec<GlossaryRow>> {
    let zh = table.require_column(&cols.chinese)?;
    let en = table.require_column(&cols.english)?;
    Ok(table
        .rows
        .iter()
        .map(|row| GlossaryRow {
            chinese: row[zh].clone(),
            english: row[en].clone(),
        })
        .collect())
}

/// Needs the Chinese-name column and at least one abbreviation or full-name column.
pub fn authority_rows(table: &Table, cols: &AuthorColumns) -> anyhow::Result<Vec<AuthorityRow>> {
    let zh = table.require_column(&cols.chinese)?;
    let abbr: Vec<usize> = cols.abbreviations.iter().filter_map(|c| table.column(c)).collect();
    let full: Vec<usize> = cols.full_names.iter().filter_map(|c| table.column(c)).collect();
    if abbr.is_empty() && full.is_empty() {
        bail!(
            "{}: none of the name columns present ({})",
            table.path.display(),
            cols.abbreviations
                .iter()
                .chain(cols.full_names.iter())
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(table
        .rows
        .iter()
        .map(|row| AuthorityRow {
            abbreviations: pick_cells(row, &abbr),
            full_names: pick_cells(row, &full),
            chinese_name: row[zh].clone(),
        })
        .collect())
}

fn pick_cells(row: &[String], idx: &[usize]) -> Vec<String> {
    idx.iter()
        .map(|&i| row[i].clone())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Optional columns (category, passthrough) absent from the table.
#[must_use]
pub fn missing_optional_columns(table: &Table, cols: &SegmentColumns) -> Vec<String> {
    table.missing_columns(cols.category.iter().chain(cols.passthrough.iter()))
}

/// English and Chinese columns are required; absent optional columns read as empty.
pub fn segment_pairs(
    table: &Table,
    block: Block,
    cols: &SegmentColumns,
) -> anyhow::Result<Vec<SegmentPair>> {
    let en = table.require_column(&cols.english)?;
    let zh = table.require_column(&cols.chinese)?;
    let category = cols.category.as_deref().and_then(|c| table.column(c));
    let passthrough: Vec<(&String, Option<usize>)> = cols
        .passthrough
        .iter()
        .map(|name| (name, table.column(name)))
        .collect();

    Ok(table
        .rows
        .iter()
        .enumerate()
        .map(|(row_index, row)| {
            let metadata: BTreeMap<String, String> = passthrough
                .iter()
                .map(|(name, idx)| {
                    let value = idx.map(|i| row[i].clone()).unwrap_or_default();
                    ((*name).clone(), value)
                })
                .collect();
            SegmentPair {
                block,
                row_index,
                english: row[en].clone(),
                chinese: row[zh].clone(),
                category: category.map(|i| row[i].clone()),
                metadata,
            }
        })
        .collect())
}
