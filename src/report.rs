use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::Serialize;

use crate::authors::PersonStatus;
use crate::evaluate::{Block, Verdict};
use crate::tables::TableInfo;
use crate::terminology::{TermDrift, TermDriftTracker};
use crate::textutil::preview;

pub const KEY_LABEL: &str = "Key";
pub const DESCRIPTION_LABEL: &str = "Description (in-scope)";

/// KPIs over a set of verdicts. Rates are `None` when their denominator is empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockSummary {
    pub label: String,
    pub n_rows: usize,
    pub translated_rate: Option<f64>,
    pub term_hit_row_rate: Option<f64>,
    pub mean_term_recall_when_hit: Option<f64>,
    pub critical_pass_rate: Option<f64>,
    pub entity_pass_rate: Option<f64>,
    pub name_verifiable_rows: usize,
    pub name_accuracy_on_verifiable_rows: Option<f64>,
}

fn rate(count: usize, n: usize) -> Option<f64> {
    (n > 0).then(|| count as f64 / n as f64)
}

#[must_use]
pub fn summarize(label: &str, rows: &[&Verdict]) -> BlockSummary {
    let n = rows.len();
    let count = |pred: &dyn Fn(&Verdict) -> bool| rows.iter().filter(|v| pred(**v)).count();

    let recalls: Vec<f64> = rows
        .iter()
        .filter(|v| v.translated && v.term_hits > 0)
        .filter_map(|v| v.term_recall)
        .collect();
    let mean_recall =
        (!recalls.is_empty()).then(|| recalls.iter().sum::<f64>() / recalls.len() as f64);

    let verifiable: Vec<&&Verdict> = rows.iter().filter(|v| v.person.verifiable_n > 0).collect();
    let names_ok = verifiable
        .iter()
        .filter(|v| v.person.status == PersonStatus::Ok)
        .count();

    BlockSummary {
        label: label.to_string(),
        n_rows: n,
        translated_rate: rate(count(&|v| v.translated), n),
        term_hit_row_rate: rate(count(&|v| v.term_hits > 0), n),
        mean_term_recall_when_hit: mean_recall,
        critical_pass_rate: rate(count(&|v| v.critical_pass), n),
        entity_pass_rate: rate(count(&|v| v.entity_pass), n),
        name_verifiable_rows: verifiable.len(),
        name_accuracy_on_verifiable_rows: rate(names_ok, verifiable.len()),
    }
}

/// One summary per category over in-scope description rows; largest first.
#[must_use]
pub fn summarize_by_category(rows: &[&Verdict]) -> Vec<BlockSummary> {
    let mut groups: BTreeMap<&str, Vec<&Verdict>> = BTreeMap::new();
    for &v in rows {
        groups
            .entry(v.category.as_deref().unwrap_or(""))
            .or_default()
            .push(v);
    }
    let mut out: Vec<BlockSummary> = groups
        .into_iter()
        .map(|(cat, members)| summarize(cat, &members))
        .collect();
    out.sort_by(|a, b| b.n_rows.cmp(&a.n_rows).then_with(|| a.label.cmp(&b.label)));
    out
}

/// A row failing the critical check, with truncated text.
#[derive(Clone, Debug, Serialize)]
pub struct IssueRow {
    pub block: Block,
    pub row_index: usize,
    pub metadata: BTreeMap<String, String>,
    pub category: Option<String>,
    pub english: String,
    pub chinese: String,
    pub flags: String,
    pub term_recall: Option<f64>,
    pub term_missing: Vec<String>,
}

impl IssueRow {
    fn from_verdict(v: &Verdict, preview_chars: usize) -> Self {
        Self {
            block: v.block,
            row_index: v.row_index,
            metadata: v.metadata.clone(),
            category: v.category.clone(),
            english: preview(&v.english, preview_chars),
            chinese: preview(&v.chinese, preview_chars),
            flags: v.flag_labels(),
            term_recall: v.term_recall,
            term_missing: v.term_missing.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NameIssue {
    pub row_index: usize,
    pub metadata: BTreeMap<String, String>,
    pub category: Option<String>,
    pub english: String,
    pub chinese: String,
    pub verifiable_n: usize,
    pub expected_cn: BTreeSet<String>,
    pub matched_ids: BTreeSet<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct KnowledgeBaseStats {
    pub term_variants: usize,
    pub term_max_ngram: usize,
    pub authority_rows: usize,
    pub authority_verifiable_rows: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportMeta {
    pub tool: &'static str,
    pub version: &'static str,
    /// Role ("glossary", "authors", "key", "description") -> loaded table.
    pub inputs: BTreeMap<String, TableInfo>,
    pub knowledge_bases: KnowledgeBaseStats,
    pub out_of_scope_categories: Vec<String>,
}

impl ReportMeta {
    #[must_use]
    pub fn new(knowledge_bases: KnowledgeBaseStats, out_of_scope_categories: Vec<String>) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            inputs: BTreeMap::new(),
            knowledge_bases,
            out_of_scope_categories,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct QaReport {
    pub meta: ReportMeta,
    pub kpi: Vec<BlockSummary>,
    pub kpi_by_category: Vec<BlockSummary>,
    pub key_rows: Vec<Verdict>,
    pub description_rows: Vec<Verdict>,
    pub key_issues: Vec<IssueRow>,
    pub description_issues: Vec<IssueRow>,
    pub name_issues: Vec<NameIssue>,
    pub term_drift: Vec<TermDrift>,
}

#[must_use]
pub fn build_report(
    meta: ReportMeta,
    key_rows: Vec<Verdict>,
    description_rows: Vec<Verdict>,
    preview_chars: usize,
) -> QaReport {
    let key_all: Vec<&Verdict> = key_rows.iter().collect();
    let desc_in_scope: Vec<&Verdict> = description_rows.iter().filter(|v| v.in_scope).collect();

    let kpi = vec![
        summarize(KEY_LABEL, &key_all),
        summarize(DESCRIPTION_LABEL, &desc_in_scope),
    ];
    let kpi_by_category = summarize_by_category(&desc_in_scope);

    let key_issues = key_all
        .iter()
        .filter(|v| v.translated && !v.critical_pass)
        .map(|v| IssueRow::from_verdict(v, preview_chars))
        .collect();
    let description_issues = desc_in_scope
        .iter()
        .filter(|v| v.translated && !v.critical_pass)
        .map(|v| IssueRow::from_verdict(v, preview_chars))
        .collect();
    let name_issues = desc_in_scope
        .iter()
        .filter(|v| v.person.verifiable_n > 0 && v.person.status == PersonStatus::Fail)
        .map(|v| NameIssue {
            row_index: v.row_index,
            metadata: v.metadata.clone(),
            category: v.category.clone(),
            english: preview(&v.english, preview_chars),
            chinese: preview(&v.chinese, preview_chars),
            verifiable_n: v.person.verifiable_n,
            expected_cn: v.person.expected_cn.clone(),
            matched_ids: v.person.matched_ids.clone(),
        })
        .collect();

    let mut drift = TermDriftTracker::new();
    for v in key_rows.iter().chain(description_rows.iter()) {
        drift.record(&v.term_found);
    }

    QaReport {
        meta,
        kpi,
        kpi_by_category,
        key_issues,
        description_issues,
        name_issues,
        term_drift: drift.drifted(),
        key_rows,
        description_rows,
    }
}

fn fmt_rate(r: Option<f64>) -> String {
    match r {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

impl QaReport {
    /// Short console digest of the KPIs and issue counts.
    #[must_use]
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        for s in &self.kpi {
            let recall = s
                .mean_term_recall_when_hit
                .map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"));
            let _ = writeln!(
                out,
                "{}: {} rows | translated {} | term hit {} | recall {} | critical {} | entity {} | names {}/{}",
                s.label,
                s.n_rows,
                fmt_rate(s.translated_rate),
                fmt_rate(s.term_hit_row_rate),
                recall,
                fmt_rate(s.critical_pass_rate),
                fmt_rate(s.entity_pass_rate),
                fmt_rate(s.name_accuracy_on_verifiable_rows),
                s.name_verifiable_rows,
            );
        }
        let _ = write!(
            out,
            "issues: key {} | description {} | names {} | drifted terms {}",
            self.key_issues.len(),
            self.description_issues.len(),
            self.name_issues.len(),
            self.term_drift.len(),
        );
        out
    }
}
