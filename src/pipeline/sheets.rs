use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::evaluate::Verdict;
use crate::report::{BlockSummary, IssueRow, NameIssue, QaReport};

/// Writes report sections as tab-separated sheets, one file per section.
pub struct SheetWriter {
    dir: PathBuf,
}

impl SheetWriter {
    pub fn new(dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create sheets dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_sheet(
        &self,
        name: &str,
        headers: &[String],
        rows: &[Vec<String>],
    ) -> anyhow::Result<PathBuf> {
        let mut text = String::new();
        push_line(&mut text, headers);
        for row in rows {
            push_line(&mut text, row);
        }
        let path = self.dir.join(sanitize_filename(&format!("{name}.tsv")));
        std::fs::write(&path, text).with_context(|| format!("write sheet: {}", path.display()))?;
        Ok(path)
    }

    /// All eight report sections; returns the written paths.
    pub fn write_report(&self, report: &QaReport) -> anyhow::Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let (h, rows) = summary_sheet("label", &report.kpi);
        written.push(self.write_sheet("KPI_Summary", &h, &rows)?);
        let (h, rows) = summary_sheet("category", &report.kpi_by_category);
        written.push(self.write_sheet("KPI_by_Category", &h, &rows)?);

        let (h, rows) = rowwise_sheet(&report.key_rows, false);
        written.push(self.write_sheet("Key_Rowwise", &h, &rows)?);
        let (h, rows) = rowwise_sheet(&report.description_rows, true);
        written.push(self.write_sheet("Desc_Rowwise", &h, &rows)?);

        let (h, rows) = issue_sheet(&report.key_issues);
        written.push(self.write_sheet("Top_Issues_Key", &h, &rows)?);
        let (h, rows) = issue_sheet(&report.description_issues);
        written.push(self.write_sheet("Top_Issues_Desc", &h, &rows)?);

        let (h, rows) = name_issue_sheet(&report.name_issues);
        written.push(self.write_sheet("Name_Issues", &h, &rows)?);

        let h = headers(&["en_term", "n_cn_variants", "cn_variants"]);
        let rows: Vec<Vec<String>> = report
            .term_drift
            .iter()
            .map(|d| {
                let variants = d
                    .cn_variants
                    .iter()
                    .map(|(zh, n)| format!("{zh} ({n})"))
                    .collect::<Vec<_>>()
                    .join(" | ");
                vec![d.en_term.clone(), d.n_cn_variants.to_string(), variants]
            })
            .collect();
        written.push(self.write_sheet("Term_Drift", &h, &rows)?);

        Ok(written)
    }
}

type Sheet = (Vec<String>, Vec<Vec<String>>);

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn push_line(out: &mut String, cells: &[String]) {
    let line = cells
        .iter()
        .map(|c| clean_cell(c))
        .collect::<Vec<_>>()
        .join("\t");
    let _ = writeln!(out, "{line}");
}

fn clean_cell(cell: &str) -> String {
    cell.replace(|c: char| matches!(c, '\t' | '\r' | '\n'), " ")
}

fn flag01(b: bool) -> String {
    (if b { "1" } else { "0" }).to_string()
}

fn opt_f64(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_default()
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>, sep: &str) -> String {
    items
        .into_iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn summary_sheet(first: &str, rows: &[BlockSummary]) -> Sheet {
    let h = headers(&[
        first,
        "n_rows",
        "translated_rate",
        "term_hit_row_rate",
        "mean_term_recall_when_hit",
        "critical_pass_rate",
        "entity_pass_rate",
        "name_verifiable_rows",
        "name_accuracy_on_verifiable_rows",
    ]);
    let rows = rows
        .iter()
        .map(|s| {
            vec![
                s.label.clone(),
                s.n_rows.to_string(),
                opt_f64(s.translated_rate),
                opt_f64(s.term_hit_row_rate),
                opt_f64(s.mean_term_recall_when_hit),
                opt_f64(s.critical_pass_rate),
                opt_f64(s.entity_pass_rate),
                s.name_verifiable_rows.to_string(),
                opt_f64(s.name_accuracy_on_verifiable_rows),
            ]
        })
        .collect();
    (h, rows)
}

fn metadata_columns<'a>(maps: impl Iterator<Item = &'a BTreeMap<String, String>>) -> Vec<String> {
    let keys: BTreeSet<&String> = maps.flat_map(|m| m.keys()).collect();
    keys.into_iter().cloned().collect()
}

fn rowwise_sheet(verdicts: &[Verdict], with_person: bool) -> Sheet {
    let meta = metadata_columns(verdicts.iter().map(|v| &v.metadata));
    let mut h = meta.clone();
    h.extend(headers(&["row_index", "category", "english", "chinese", "in_scope", "translated"]));
    h.extend(headers(&["term_hits", "term_ok", "term_recall", "term_missing"]));
    h.extend(headers(&["flags", "critical_pass", "entity_pass"]));
    if with_person {
        h.extend(headers(&[
            "person_status",
            "person_verifiable_n",
            "person_expected_cn",
            "person_reason",
            "person_matched_ids",
        ]));
    }
    let rows = verdicts
        .iter()
        .map(|v| {
            let mut row: Vec<String> = meta
                .iter()
                .map(|k| v.metadata.get(k).cloned().unwrap_or_default())
                .collect();
            row.extend([
                v.row_index.to_string(),
                v.category.clone().unwrap_or_default(),
                v.english.clone(),
                v.chinese.clone(),
                flag01(v.in_scope),
                flag01(v.translated),
                v.term_hits.to_string(),
                v.term_ok.to_string(),
                opt_f64(v.term_recall),
                v.term_missing.join(";"),
                v.flag_labels(),
                flag01(v.critical_pass),
                flag01(v.entity_pass),
            ]);
            if with_person {
                let p = &v.person;
                row.extend([
                    p.status.label().to_string(),
                    p.verifiable_n.to_string(),
                    join(p.expected_cn.iter(), " | "),
                    join(p.reasons.iter().map(|r| r.label()), ","),
                    join(p.matched_ids.iter(), ","),
                ]);
            }
            row
        })
        .collect();
    (h, rows)
}

fn issue_sheet(issues: &[IssueRow]) -> Sheet {
    let meta = metadata_columns(issues.iter().map(|i| &i.metadata));
    let mut h = meta.clone();
    h.extend(headers(&[
        "row_index",
        "category",
        "english",
        "chinese",
        "flags",
        "term_recall",
        "term_missing",
    ]));
    let rows = issues
        .iter()
        .map(|i| {
            let mut row: Vec<String> = meta
                .iter()
                .map(|k| i.metadata.get(k).cloned().unwrap_or_default())
                .collect();
            row.extend([
                i.row_index.to_string(),
                i.category.clone().unwrap_or_default(),
                i.english.clone(),
                i.chinese.clone(),
                i.flags.clone(),
                opt_f64(i.term_recall),
                i.term_missing.join(";"),
            ]);
            row
        })
        .collect();
    (h, rows)
}

fn name_issue_sheet(issues: &[NameIssue]) -> Sheet {
    let meta = metadata_columns(issues.iter().map(|i| &i.metadata));
    let mut h = meta.clone();
    h.extend(headers(&[
        "row_index",
        "category",
        "english",
        "chinese",
        "verifiable_n",
        "expected_cn",
        "matched_ids",
    ]));
    let rows = issues
        .iter()
        .map(|i| {
            let mut row: Vec<String> = meta
                .iter()
                .map(|k| i.metadata.get(k).cloned().unwrap_or_default())
                .collect();
            row.extend([
                i.row_index.to_string(),
                i.category.clone().unwrap_or_default(),
                i.english.clone(),
                i.chinese.clone(),
                i.verifiable_n.to_string(),
                join(i.expected_cn.iter(), " | "),
                join(i.matched_ids.iter(), ","),
            ]);
            row
        })
        .collect();
    (h, rows)
}

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_lose_tabs_and_newlines() {
        assert_eq!(clean_cell("a\tb\r\nc"), "a b  c");
        assert_eq!(sanitize_filename("KPI/by:Category"), "KPI_by_Category");
        assert_eq!(opt_f64(None), "");
        assert_eq!(opt_f64(Some(0.5)), "0.5000");
    }

    #[test]
    fn summary_sheet_has_one_row_per_block() {
        let s = crate::report::summarize("Key", &[]);
        let (h, rows) = summary_sheet("label", &[s]);
        assert_eq!(h.len(), 9);
        assert_eq!(rows[0][0], "Key");
        assert_eq!(rows[0][1], "0");
        assert_eq!(rows[0][2], "");
    }
}
