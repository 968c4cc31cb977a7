use std::path::{Path, PathBuf};

use anyhow::bail;

use crate::authors::DEFAULT_PLACEHOLDERS;
use crate::config::{
    find_default_config, load_config, AppConfig, ColumnsSection, CONFIG_ENV, CONFIG_FILENAME,
};
use crate::evaluate::EvalOptions;
use crate::quality::CheckOptions;

pub const DEFAULT_REPORT: &str = "qa_report.json";

/// Run settings after merging command line, config file and defaults.
#[derive(Clone, Debug)]
pub struct QaConfig {
    pub workdir: PathBuf,
    pub config_path: PathBuf,
    pub config_loaded: bool,

    pub glossary: PathBuf,
    pub authors: PathBuf,
    pub key: Option<PathBuf>,
    pub description: Option<PathBuf>,

    pub report: PathBuf,
    pub sheets_dir: Option<PathBuf>,
    pub preview_chars: usize,

    /// 0 lets the pool pick one worker per core.
    pub threads: usize,
    pub name_placeholders: Vec<String>,
    pub eval: EvalOptions,
    pub columns: ColumnsSection,
}

impl QaConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn from_paths_and_args(
        config_path: Option<PathBuf>,
        glossary: Option<PathBuf>,
        authors: Option<PathBuf>,
        key: Option<PathBuf>,
        description: Option<PathBuf>,
        output: Option<PathBuf>,
        sheets_dir: Option<PathBuf>,
        threads: Option<usize>,
    ) -> anyhow::Result<Self> {
        let workdir = [&key, &description, &glossary, &authors]
            .into_iter()
            .flatten()
            .find_map(|p| p.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        let workdir = workdir.canonicalize().unwrap_or(workdir);

        let cfg_file = config_path
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        let mut config_loaded = false;
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
                config_loaded = true;
            }
        }
        let cfg_path = cfg_file.unwrap_or_else(|| workdir.join(CONFIG_FILENAME));
        let cfg_dir = cfg_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let from_file = |p: &Option<PathBuf>| p.as_ref().map(|p| relative_to(&cfg_dir, p));

        let glossary = match glossary.or_else(|| from_file(&file_cfg.inputs.glossary)) {
            Some(p) => p,
            None => bail!("no glossary table: pass --glossary or set inputs.glossary"),
        };
        let authors = match authors.or_else(|| from_file(&file_cfg.inputs.authors)) {
            Some(p) => p,
            None => bail!("no author table: pass --authors or set inputs.authors"),
        };
        let key = key.or_else(|| from_file(&file_cfg.inputs.key));
        let description = description.or_else(|| from_file(&file_cfg.inputs.description));
        if key.is_none() && description.is_none() {
            bail!("nothing to check: pass --key and/or --description");
        }

        let report = output
            .or_else(|| from_file(&file_cfg.output.report))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT));
        let sheets_dir = sheets_dir.or_else(|| from_file(&file_cfg.output.sheets_dir));
        let preview_chars = file_cfg.output.preview_chars.unwrap_or(260);
        let max_missing_terms = file_cfg.output.max_missing_terms.unwrap_or(20);

        let checks = &file_cfg.checks;
        let threads = threads.or(checks.threads).unwrap_or(0);
        let name_placeholders = checks.name_placeholders.clone().unwrap_or_else(|| {
            DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect()
        });
        let defaults = EvalOptions::default();
        let eval = EvalOptions {
            out_of_scope_categories: checks
                .out_of_scope_categories
                .clone()
                .unwrap_or(defaults.out_of_scope_categories),
            max_missing_terms,
            checks: CheckOptions {
                normalize_months: checks.normalize_months.unwrap_or(true),
            },
        };

        Ok(Self {
            workdir,
            config_path: cfg_path,
            config_loaded,
            glossary,
            authors,
            key,
            description,
            report,
            sheets_dir,
            preview_chars,
            threads,
            name_placeholders,
            eval,
            columns: file_cfg.columns,
        })
    }
}

fn relative_to(base: &Path, p: &Path) -> PathBuf {
    if p.is_relative() {
        base.join(p)
    } else {
        p.to_path_buf()
    }
}
