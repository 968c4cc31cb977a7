use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::authors::NameKb;
use crate::config::SegmentColumns;
use crate::evaluate::{evaluate_rows, Block, EvalOptions, KnowledgeBases, SegmentPair, Verdict};
use crate::pipeline::config::QaConfig;
use crate::pipeline::sheets::SheetWriter;
use crate::progress::ConsoleProgress;
use crate::report::{build_report, KnowledgeBaseStats, QaReport, ReportMeta};
use crate::tables::{
    authority_rows, glossary_rows, missing_optional_columns, read_table, segment_pairs, Table,
};
use crate::terminology::TermKb;

/// Rows evaluated between progress lines.
const PROGRESS_CHUNK: usize = 500;

pub struct QaPipeline {
    cfg: QaConfig,
    progress: ConsoleProgress,
}

/// What a finished run produced on disk.
pub struct RunOutput {
    pub report: QaReport,
    pub report_path: PathBuf,
    pub sheets: Vec<PathBuf>,
}

impl QaPipeline {
    pub fn new(cfg: QaConfig, progress: ConsoleProgress) -> Self {
        Self { cfg, progress }
    }

    pub fn run(&self) -> anyhow::Result<RunOutput> {
        let cfg = &self.cfg;
        if cfg.config_loaded {
            self.progress.info(format!("Config: {}", cfg.config_path.display()));
        } else {
            self.progress.info("Config: none found, using defaults");
        }

        let glossary = self.load("glossary", &cfg.glossary)?;
        let terms = TermKb::build(&glossary_rows(&glossary, &cfg.columns.glossary)?);
        self.progress.info(format!(
            "Term KB: {} variants (max n-gram {})",
            terms.len(),
            terms.max_ngram()
        ));

        let authors = self.load("authors", &cfg.authors)?;
        let names = NameKb::build(
            &authority_rows(&authors, &cfg.columns.authors)?,
            &cfg.name_placeholders,
        );
        self.progress.info(format!(
            "Name KB: {} rows, {} verifiable",
            names.len(),
            names.verifiable_count()
        ));

        let mut meta = ReportMeta::new(
            KnowledgeBaseStats {
                term_variants: terms.len(),
                term_max_ngram: terms.max_ngram(),
                authority_rows: names.len(),
                authority_verifiable_rows: names.verifiable_count(),
            },
            cfg.eval.out_of_scope_categories.clone(),
        );
        meta.inputs.insert("glossary".to_string(), glossary.info());
        meta.inputs.insert("authors".to_string(), authors.info());
        drop(glossary);
        drop(authors);

        let kb = KnowledgeBases { terms, names };

        let key_cols = SegmentColumns::from(&cfg.columns.key);
        let desc_cols = SegmentColumns::from(&cfg.columns.description);
        let key_pairs = self.load_segments("key", cfg.key.as_deref(), Block::Key, &key_cols, &mut meta)?;
        let desc_pairs = self.load_segments(
            "description",
            cfg.description.as_deref(),
            Block::Description,
            &desc_cols,
            &mut meta,
        )?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.threads)
            .build()
            .context("build worker pool")?;
        self.progress.info(format!("Workers: {}", pool.current_num_threads()));
        let (key_rows, desc_rows) = pool.install(|| {
            (
                self.evaluate_block(Block::Key, &key_pairs, &kb, &cfg.eval),
                self.evaluate_block(Block::Description, &desc_pairs, &kb, &cfg.eval),
            )
        });

        let report = build_report(meta, key_rows, desc_rows, cfg.preview_chars);
        write_json(&cfg.report, &report)?;
        self.progress.info(format!("Write report: {}", cfg.report.display()));

        let mut sheets = Vec::new();
        if let Some(dir) = cfg.sheets_dir.as_ref() {
            let writer = SheetWriter::new(dir.clone())?;
            sheets = writer.write_report(&report)?;
            self.progress.info(format!(
                "Write sheets: {} ({} files)",
                writer.dir().display(),
                sheets.len()
            ));
        }

        Ok(RunOutput {
            report,
            report_path: cfg.report.clone(),
            sheets,
        })
    }

    fn load(&self, role: &str, path: &Path) -> anyhow::Result<Table> {
        let table = read_table(path).with_context(|| format!("load {role} table"))?;
        self.progress.info(format!(
            "Read {role}: {} ({} rows, {}, sha256 {})",
            path.display(),
            table.len(),
            table.encoding,
            &table.sha256[..12]
        ));
        Ok(table)
    }

    fn load_segments(
        &self,
        role: &str,
        path: Option<&Path>,
        block: Block,
        cols: &SegmentColumns,
        meta: &mut ReportMeta,
    ) -> anyhow::Result<Vec<SegmentPair>> {
        let Some(path) = path else {
            self.progress.info(format!("No {role} table; block left empty"));
            return Ok(Vec::new());
        };
        let table = self.load(role, path)?;
        for col in missing_optional_columns(&table, cols) {
            self.progress
                .warn(format!("{role} table has no column {col:?}; treated as empty"));
        }
        let pairs = segment_pairs(&table, block, cols)
            .with_context(|| format!("map {role} table: {}", path.display()))?;
        meta.inputs.insert(role.to_string(), table.info());
        Ok(pairs)
    }

    fn evaluate_block(
        &self,
        block: Block,
        pairs: &[SegmentPair],
        kb: &KnowledgeBases,
        opts: &EvalOptions,
    ) -> Vec<Verdict> {
        let mut out = Vec::with_capacity(pairs.len());
        for chunk in pairs.chunks(PROGRESS_CHUNK) {
            out.extend(evaluate_rows(chunk, kb, opts));
            self.progress.progress(block.label(), out.len(), pairs.len());
        }
        out
    }
}

fn write_json(path: &Path, report: &QaReport) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create report dir: {}", dir.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(report).context("serialize report")?;
    std::fs::write(path, bytes).with_context(|| format!("write report: {}", path.display()))?;
    Ok(())
}
