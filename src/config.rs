use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILENAME: &str = "foc-autoqa.toml";
pub const CONFIG_ENV: &str = "FOC_AUTOQA_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub inputs: InputsSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub checks: ChecksSection,
    #[serde(default)]
    pub columns: ColumnsSection,
}

/// Table paths; relative paths resolve against the config file directory.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct InputsSection {
    #[serde(default)]
    pub glossary: Option<PathBuf>,
    #[serde(default)]
    pub authors: Option<PathBuf>,
    #[serde(default)]
    pub key: Option<PathBuf>,
    #[serde(default)]
    pub description: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OutputSection {
    #[serde(default)]
    pub report: Option<PathBuf>,
    /// When set, every report section is also written as a tab-separated sheet here.
    #[serde(default)]
    pub sheets_dir: Option<PathBuf>,
    #[serde(default)]
    pub preview_chars: Option<usize>,
    #[serde(default)]
    pub max_missing_terms: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ChecksSection {
    #[serde(default)]
    pub out_of_scope_categories: Option<Vec<String>>,
    /// Chinese-name cells that mean "no rendering known".
    #[serde(default)]
    pub name_placeholders: Option<Vec<String>>,
    #[serde(default)]
    pub normalize_months: Option<bool>,
    /// Worker threads for row evaluation; 0 means one per core.
    #[serde(default)]
    pub threads: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ColumnsSection {
    #[serde(default)]
    pub glossary: GlossaryColumns,
    #[serde(default)]
    pub authors: AuthorColumns,
    #[serde(default)]
    pub key: KeyColumns,
    #[serde(default)]
    pub description: DescriptionColumns,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GlossaryColumns {
    pub chinese: String,
    pub english: String,
}

impl Default for GlossaryColumns {
    fn default() -> Self {
        Self {
            chinese: "名词(中文)".to_string(),
            english: "名词(英文)".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AuthorColumns {
    pub abbreviations: Vec<String>,
    pub full_names: Vec<String>,
    pub chinese: String,
}

impl Default for AuthorColumns {
    fn default() -> Self {
        Self {
            abbreviations: vec!["去掉空格的缩写".to_string(), "标准缩写".to_string()],
            full_names: vec!["全名，把逗号换成了空格".to_string(), "全名".to_string()],
            chinese: "中文名".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct KeyColumns {
    pub english: String,
    pub chinese: String,
    pub passthrough: Vec<String>,
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            english: "Description".to_string(),
            chinese: "Description_qw".to_string(),
            passthrough: strings(&["ID", "KeyNo", "ItemNo", "Branch"]),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DescriptionColumns {
    pub english: String,
    pub chinese: String,
    pub category: String,
    pub passthrough: Vec<String>,
}

impl Default for DescriptionColumns {
    fn default() -> Self {
        Self {
            english: "Content".to_string(),
            chinese: "Content_qw".to_string(),
            category: "CategoryValue".to_string(),
            passthrough: strings(&["id", "TaxonId"]),
        }
    }
}

/// Column layout of a segment table, whichever block it feeds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentColumns {
    pub english: String,
    pub chinese: String,
    /// Category column used for scope gating; key tables have none.
    pub category: Option<String>,
    /// Copied verbatim into each verdict for identification.
    pub passthrough: Vec<String>,
}

impl From<&KeyColumns> for SegmentColumns {
    fn from(c: &KeyColumns) -> Self {
        Self {
            english: c.english.clone(),
            chinese: c.chinese.clone(),
            category: None,
            passthrough: c.passthrough.clone(),
        }
    }
}

impl From<&DescriptionColumns> for SegmentColumns {
    fn from(c: &DescriptionColumns) -> Self {
        let category = c.category.trim();
        Self {
            english: c.english.clone(),
            chinese: c.chinese.clone(),
            category: (!category.is_empty()).then(|| category.to_string()),
            passthrough: c.passthrough.clone(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("parse config toml: {}", path.display()))
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text)?;
    Ok(cfg)
}

/// Write a commented default config into `dir` (kept if present unless `force`).
/// Returns the config path and whether the file was written; an existing
/// file is kept unless `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<(PathBuf, bool)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok((cfg_path, false));
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok((cfg_path, true))
}

pub const DEFAULT_CONFIG_TOML: &str = r#"[inputs]
# Tables are tab-separated with a header row, or .json / .jsonl row objects.
glossary = "植物形态术语中英名词解释.txt"
authors = "植物分类命名人数据.tsv"
key = "foc_key_qwkc.tsv"
description = "蔷薇科描述翻译.tsv"

[output]
report = "qa_report.json"
# sheets_dir = "qa_sheets"
preview_chars = 260
max_missing_terms = 20

[checks]
out_of_scope_categories = ["synonym"]
name_placeholders = ["【空】", "?", "？"]
# Map "May–Jun" to "5–6" before NUM so it matches "5-6月".
normalize_months = true
# 0 = one worker per core
threads = 0

[columns.glossary]
chinese = "名词(中文)"
english = "名词(英文)"

[columns.authors]
abbreviations = ["去掉空格的缩写", "标准缩写"]
full_names = ["全名，把逗号换成了空格", "全名"]
chinese = "中文名"

[columns.key]
english = "Description"
chinese = "Description_qw"
passthrough = ["ID", "KeyNo", "ItemNo", "Branch"]

[columns.description]
english = "Content"
chinese = "Content_qw"
category = "CategoryValue"
passthrough = ["id", "TaxonId"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").expect("parse");
        assert!(cfg.inputs.glossary.is_none());
        assert_eq!(cfg.columns.glossary.english, "名词(英文)");
        assert_eq!(cfg.columns.key.english, "Description");
        assert_eq!(cfg.columns.description.english, "Content");
        let key = SegmentColumns::from(&cfg.columns.key);
        assert!(key.category.is_none());
        let desc = SegmentColumns::from(&cfg.columns.description);
        assert_eq!(desc.category.as_deref(), Some("CategoryValue"));
    }

    #[test]
    fn default_template_parses() {
        let cfg = parse_config(DEFAULT_CONFIG_TOML).expect("parse");
        assert_eq!(cfg.output.preview_chars, Some(260));
        assert_eq!(cfg.checks.threads, Some(0));
        assert_eq!(cfg.columns.authors.abbreviations.len(), 2);
        assert_eq!(cfg.columns.description.passthrough, vec!["id", "TaxonId"]);
    }

    #[test]
    fn partial_column_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
[columns.description]
english = "EN"

[columns.key]
passthrough = []

[checks]
out_of_scope_categories = ["synonym", "misapplied"]
"#,
        )
        .expect("parse");
        assert_eq!(cfg.columns.description.english, "EN");
        assert_eq!(cfg.columns.description.chinese, "Content_qw");
        assert_eq!(cfg.columns.description.category, "CategoryValue");
        assert_eq!(
            cfg.checks.out_of_scope_categories,
            Some(vec!["synonym".to_string(), "misapplied".to_string()])
        );
        assert!(cfg.columns.key.passthrough.is_empty());
        assert_eq!(cfg.columns.key.english, "Description");
    }

    #[test]
    fn init_keeps_existing_file_without_force() {
        let dir = std::env::temp_dir().join(format!("foc-autoqa-init-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let (path, written) = init_default_config(&dir, false).expect("init");
        assert!(written);
        std::fs::write(&path, "[output]\nreport = \"mine.json\"\n").expect("edit");

        let (_, written) = init_default_config(&dir, false).expect("keep");
        assert!(!written);
        assert!(std::fs::read_to_string(&path).expect("read").contains("mine.json"));

        let (_, written) = init_default_config(&dir, true).expect("force");
        assert!(written);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), DEFAULT_CONFIG_TOML);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
