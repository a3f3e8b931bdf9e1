use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use coc_parser::db::{self, FailedDocument, ParsedDocument};
use coc_parser::export;
use coc_parser::settings::Settings;
use coc_parser::{build_row, process_document, Dispatcher, PageCorpus, SpecRegistry};

#[derive(Parser)]
#[command(name = "coc_parser", about = "Extract structured answers from CoC application text")]
struct Cli {
    /// JSON spec file to use instead of the built-in 2024 specs
    #[arg(long, global = true)]
    specs: Option<PathBuf>,
    /// SQLite database (default from settings)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one page-marked text file and print its row
    Parse {
        file: PathBuf,
        /// Print the row as a JSON object
        #[arg(long)]
        json: bool,
    },
    /// Parse every .txt file in a directory and save rows to SQLite
    Batch {
        dir: PathBuf,
        /// Worker threads (default: settings, then all cores)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
        /// Only files whose name contains this text
        #[arg(short, long)]
        pattern: Option<String>,
    },
    /// List the loaded section specs
    Specs,
    /// Show database statistics
    Stats,
    /// Write every stored row as one stacked table
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Jsonl)]
        format: ExportFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    /// One JSON object per document
    Jsonl,
    /// Tab-separated with a header row
    Tsv,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(p) = cli.specs {
        settings.specs = Some(p);
    }
    if let Some(p) = cli.database {
        settings.database = p;
    }

    let result = match cli.command {
        Commands::Parse { file, json } => {
            let registry = load_registry(&settings)?;
            let dispatcher = Dispatcher::new(&registry);
            let corpus = PageCorpus::load(&file)?;
            let doc = process_document(&corpus, &dispatcher)
                .with_context(|| format!("Failed to parse {:?}", file))?;
            let row = build_row(&registry, &doc);
            if json {
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                for (col, value) in &row.columns {
                    println!("{}\t{}", col, value.replace('\n', "\\n"));
                }
            }
            Ok(())
        }
        Commands::Batch { dir, jobs, pattern } => {
            let registry = load_registry(&settings)?;
            let files = list_documents(&dir, pattern.as_deref())?;
            if files.is_empty() {
                println!("No .txt files found in {:?}.", dir);
                return Ok(());
            }

            let jobs = jobs.unwrap_or(settings.jobs);
            if jobs > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .context("Failed to configure worker threads")?;
            }

            let conn = db::connect(&settings.database)?;
            db::init_schema(&conn)?;
            println!("Parsing {} documents with {} specs...", files.len(), registry.specs().len());
            let counts = process_files(&conn, &files, &registry, settings.chunk_size.max(1))?;
            counts.print();
            Ok(())
        }
        Commands::Specs => {
            let registry = load_registry(&settings)?;
            println!("{}\n", registry.form());
            println!(
                "{:>3} | {:<14} | {:<12} | {:<10} | {:>9} | {:>5}",
                "#", "Key", "Kind", "Column", "Lookahead", "Items"
            );
            println!("{}", "-".repeat(68));
            for (i, spec) in registry.specs().iter().enumerate() {
                println!(
                    "{:>3} | {:<14} | {:<12} | {:<10} | {:>9} | {:>5}",
                    i + 1,
                    spec.key,
                    spec.kind.name(),
                    spec.column,
                    spec.lookahead,
                    spec.max_index
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.database)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Documents: {}", s.documents);
            println!("Parsed:    {}", s.ok);
            println!("Failed:    {}", s.errors);
            println!("Answers:   {}", s.answers);
            Ok(())
        }
        Commands::Export { out, format } => {
            let conn = db::connect(&settings.database)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_rows(&conn)?;
            match &out {
                Some(path) => {
                    let file = std::fs::File::create(path)
                        .with_context(|| format!("Failed to create {:?}", path))?;
                    let mut w = std::io::BufWriter::new(file);
                    write_export(&mut w, format, &rows)?;
                    w.flush()?;
                    info!(documents = rows.len(), path = %path.display(), "export written");
                }
                None => write_export(&mut std::io::stdout().lock(), format, &rows)?,
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_registry(settings: &Settings) -> anyhow::Result<SpecRegistry> {
    let registry = match &settings.specs {
        Some(path) => SpecRegistry::load(path)?,
        None => SpecRegistry::builtin().context("Built-in specs failed to compile")?,
    };
    info!(form = %registry.form(), specs = registry.specs().len(), "specs loaded");
    Ok(registry)
}

fn write_export<W: Write>(
    out: &mut W,
    format: ExportFormat,
    rows: &[(String, coc_parser::Row)],
) -> anyhow::Result<()> {
    match format {
        ExportFormat::Jsonl => export::write_json_lines(out, rows),
        ExportFormat::Tsv => export::write_tsv(out, rows),
    }
}

fn list_documents(dir: &Path, pattern: Option<&str>) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{:?} is not a directory", dir);
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if pattern.is_some_and(|p| !name.contains(p)) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

struct ProcessCounts {
    parsed: usize,
    failed: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!("Saved {} documents, {} failed.", self.parsed, self.failed);
    }
}

fn process_files(
    conn: &rusqlite::Connection,
    files: &[PathBuf],
    registry: &SpecRegistry,
    chunk_size: usize,
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let dispatcher = Dispatcher::new(registry);
    let mut counts = ProcessCounts { parsed: 0, failed: 0 };

    for chunk in files.chunks(chunk_size) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|path| (path, process_file(path, &dispatcher)))
            .collect();

        let mut parsed = Vec::new();
        let mut failed = Vec::new();
        for (path, result) in results {
            match result {
                Ok(doc) => parsed.push(doc),
                Err(e) => {
                    let error = format!("{:#}", e);
                    warn!(file = %path.display(), %error, "document skipped");
                    failed.push(FailedDocument {
                        source: path.display().to_string(),
                        error,
                    });
                }
            }
        }

        counts.parsed += db::save_documents(conn, &parsed)?;
        counts.failed += db::save_failures(conn, &failed)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn process_file(path: &Path, dispatcher: &Dispatcher) -> anyhow::Result<ParsedDocument> {
    let corpus = PageCorpus::load(path)?;
    let doc = process_document(&corpus, dispatcher)
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(ParsedDocument {
        source: path.display().to_string(),
        pages: corpus.len(),
        row: build_row(dispatcher.registry(), &doc),
    })
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
