use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use foc_autoqa::config::init_default_config;
use foc_autoqa::pipeline::{QaConfig, QaPipeline};
use foc_autoqa::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "foc-autoqa")]
#[command(
    about = "Rule-based QA for English->Chinese botanical translations (terms, critical facts, author names)",
    long_about = None
)]
struct Args {
    /// Write a default foc-autoqa.toml, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Config file path (default: search for foc-autoqa.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Morphology glossary table (Chinese/English term pairs)
    #[arg(long, value_name = "TABLE")]
    glossary: Option<PathBuf>,

    /// Author authority table (abbreviations, full names, Chinese names)
    #[arg(long, value_name = "TABLE")]
    authors: Option<PathBuf>,

    /// Identification-key segments (source + machine translation)
    #[arg(long, value_name = "TABLE")]
    key: Option<PathBuf>,

    /// Description segments (source + machine translation + category)
    #[arg(long, value_name = "TABLE")]
    description: Option<PathBuf>,

    /// Report JSON path (default: qa_report.json)
    #[arg(short, long, value_name = "JSON")]
    output: Option<PathBuf>,

    /// Also write every report section as a .tsv sheet into DIR
    #[arg(long, value_name = "DIR")]
    sheets_dir: Option<PathBuf>,

    /// Worker threads for row evaluation (default: 0 = one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Suppress progress output on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let (cfg_path, written) =
            init_default_config(&dir, args.force).context("init default config")?;
        if written {
            eprintln!("Wrote config: {}", cfg_path.display());
        } else {
            eprintln!("Kept existing config (use --force to overwrite): {}", cfg_path.display());
        }
        return Ok(());
    }

    let progress = ConsoleProgress::new(!args.quiet);
    let cfg = QaConfig::from_paths_and_args(
        args.config,
        args.glossary,
        args.authors,
        args.key,
        args.description,
        args.output,
        args.sheets_dir,
        args.threads,
    )
    .context("resolve configuration")?;

    let out = QaPipeline::new(cfg, progress).run()?;
    println!("{}", out.report.render_summary());
    println!("report: {}", out.report_path.display());
    for sheet in &out.sheets {
        println!("sheet: {}", sheet.display());
    }
    Ok(())
}
