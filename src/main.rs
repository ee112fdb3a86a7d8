use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use rusqlite::Connection;
use tracing::info;

use hansard_frames::config::Settings;
use hansard_frames::db::{self, ExcerptFilter, SortOrder, StoredDocument};
use hansard_frames::pipeline::read_jsonl;
use hansard_frames::{FrameClassifier, FrameLabel, Pipeline};

#[derive(Parser)]
#[command(name = "hansard_frames", about = "Migration/labour excerpts and frames from Hansard debates")]
struct Cli {
    /// Config file (default: ./hansard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load JSONL debate documents into the store
    Ingest {
        file: PathBuf,
        /// Keep documents whose title looks off-topic
        #[arg(long)]
        all: bool,
    },
    /// Extract and classify excerpts from unprocessed documents
    Process {
        /// Max documents to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Recompute frames for every stored excerpt with the current vocabulary
    Reclassify,
    /// Classify ad hoc text and print the assessment as JSON
    Classify {
        /// Text to classify (reads stdin when neither TEXT nor --file is given)
        text: Option<String>,
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Filtered excerpt table
    Query {
        #[command(flatten)]
        filter: FilterArgs,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Write filtered excerpts as JSONL
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Store statistics
    Stats,
}

#[derive(Args)]
struct FilterArgs {
    /// First debate year
    #[arg(long)]
    from: Option<i32>,
    /// Last debate year
    #[arg(long)]
    to: Option<i32>,
    /// NEED, THREAT, RACIALIZED, MIXED or OTHER
    #[arg(long)]
    frame: Option<FrameLabel>,
    /// Confidence floor (default: min_confidence from config)
    #[arg(long)]
    min_confidence: Option<u8>,
    /// Full-text search over excerpt, speaker and gloss
    #[arg(short, long)]
    search: Option<String>,
    #[arg(long, value_enum, default_value_t = SortOrder::Chrono)]
    sort: SortOrder,
}

impl FilterArgs {
    fn into_filter(self, settings: &Settings, limit: Option<usize>) -> ExcerptFilter {
        ExcerptFilter {
            from_year: self.from,
            to_year: self.to,
            frame: self.frame,
            min_confidence: Some(self.min_confidence.unwrap_or(settings.min_confidence)),
            search: self.search,
            sort: self.sort,
            limit,
        }
    }
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
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(path) = cli.db {
        settings.db_path = path;
    }

    let result = match cli.command {
        Commands::Ingest { file, all } => {
            let conn = open(&settings)?;
            let reader = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
            let batch = read_jsonl(BufReader::new(reader))?;
            let read = batch.documents.len();
            let (docs, off_topic): (Vec<_>, Vec<_>) = batch
                .documents
                .into_iter()
                .partition(|d| all || d.is_relevant());
            let inserted = db::insert_documents(&conn, &docs)?;
            info!(read, inserted, off_topic = off_topic.len(), malformed = batch.skipped, "ingest finished");
            println!(
                "Inserted {} new documents ({} read, {} off-topic, {} malformed lines)",
                inserted,
                read,
                off_topic.len(),
                batch.skipped
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = open(&settings)?;
            let docs = db::fetch_unprocessed(&conn, limit)?;
            if docs.is_empty() {
                println!("No unprocessed documents. Run 'ingest' first.");
                return Ok(());
            }
            let vocab = settings.vocabulary()?;
            let pipeline = Pipeline::new(&vocab, settings.extract_config());
            println!("Processing {} documents...", docs.len());
            let counts = process_documents(&conn, &docs, &pipeline, settings.chunk_size)?;
            counts.print();
            Ok(())
        }
        Commands::Reclassify => {
            let conn = open(&settings)?;
            let vocab = settings.vocabulary()?;
            let classifier = FrameClassifier::new(&vocab);
            reclassify(&conn, &classifier)
        }
        Commands::Classify { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
                    buf
                }
            };
            let vocab = settings.vocabulary()?;
            let assessment = FrameClassifier::new(&vocab).classify(&text);
            println!("{}", serde_json::to_string_pretty(&assessment)?);
            Ok(())
        }
        Commands::Query { filter, limit } => {
            let conn = open(&settings)?;
            let filter = filter.into_filter(&settings, Some(limit));
            print_table(&db::query_excerpts(&conn, &filter)?);
            Ok(())
        }
        Commands::Export { out, filter } => {
            let conn = open(&settings)?;
            let filter = filter.into_filter(&settings, None);
            let rows = db::query_excerpts(&conn, &filter)?;
            let sink: Box<dyn Write> = match &out {
                Some(path) => Box::new(
                    File::create(path).with_context(|| format!("creating {}", path.display()))?,
                ),
                None => Box::new(std::io::stdout().lock()),
            };
            let mut w = BufWriter::new(sink);
            for row in &rows {
                serde_json::to_writer(&mut w, &row.record)?;
                writeln!(w)?;
            }
            w.flush()?;
            info!(rows = rows.len(), "export finished");
            if let Some(path) = out {
                println!("Exported {} excerpts to {}", rows.len(), path.display());
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = open(&settings)?;
            let s = db::get_stats(&conn)?;
            println!("Documents:   {}", s.documents);
            println!("Processed:   {}", s.processed);
            println!("Unprocessed: {}", s.unprocessed);
            println!("Excerpts:    {}", s.excerpts);
            if let Some((first, last)) = s.years {
                println!("Years:       {}-{}", first, last);
            }
            println!("Avg words:   {:.1}", s.avg_words);
            println!("Avg conf:    {:.1}", s.avg_confidence);
            println!(
                "Avg terms:   {:.1} migration / {:.1} labour",
                s.avg_migration_terms, s.avg_labour_terms
            );
            println!("\n--- Frames ---");
            for (frame, n) in &s.frames {
                let pct = if s.excerpts == 0 {
                    0.0
                } else {
                    100.0 * *n as f64 / s.excerpts as f64
                };
                println!("  {:<10} {:>6}  ({:.1}%)", frame, n, pct);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1?}", elapsed);
    }

    result
}

fn open(settings: &Settings) -> anyhow::Result<Connection> {
    let conn = db::connect(&settings.db_path)
        .with_context(|| format!("opening {}", settings.db_path.display()))?;
    db::init_schema(&conn)?;
    Ok(conn)
}

struct ProcessCounts {
    documents: usize,
    with_excerpts: usize,
    excerpts: usize,
    stored: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Processed {} documents: {} excerpts from {} documents, {} new.",
            self.documents, self.excerpts, self.with_excerpts, self.stored,
        );
    }
}

fn process_documents(
    conn: &Connection,
    docs: &[StoredDocument],
    pipeline: &Pipeline,
    chunk_size: usize,
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        documents: 0,
        with_excerpts: 0,
        excerpts: 0,
        stored: 0,
    };

    for chunk in docs.chunks(chunk_size) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|d| (d.id, pipeline.process(&d.doc)))
            .collect();

        counts.documents += results.len();
        counts.with_excerpts += results.iter().filter(|(_, r)| !r.is_empty()).count();
        counts.excerpts += results.iter().map(|(_, r)| r.len()).sum::<usize>();
        counts.stored += db::save_processed(conn, &results)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    info!(
        documents = counts.documents,
        excerpts = counts.excerpts,
        stored = counts.stored,
        "process finished"
    );
    Ok(counts)
}

fn reclassify(conn: &Connection, classifier: &FrameClassifier) -> anyhow::Result<()> {
    use rayon::prelude::*;

    let mut rows = db::fetch_all_excerpts(conn)?;
    if rows.is_empty() {
        println!("No excerpts stored. Run 'process' first.");
        return Ok(());
    }
    rows.par_iter_mut().for_each(|r| r.record.reassess(classifier));
    let changed = db::update_assessments(conn, &rows)?;

    let summary = rows
        .iter()
        .map(|r| r.record.frame)
        .counts()
        .into_iter()
        .sorted()
        .map(|(frame, n)| format!("{} {}", frame, n))
        .join(", ");
    info!(rows = rows.len(), changed, "reclassify finished");
    println!("Reclassified {} excerpts ({} changed): {}", rows.len(), changed, summary);
    Ok(())
}

fn print_table(rows: &[db::StoredExcerpt]) {
    if rows.is_empty() {
        println!("No excerpts found.");
        return;
    }

    println!(
        "{:>3} | {:<4} | {:<10} | {:>4} | {:<24} | {:<60}",
        "#", "Year", "Frame", "Conf", "Speaker", "Excerpt"
    );
    println!("{}", "-".repeat(120));

    for (i, row) in rows.iter().enumerate() {
        let r = &row.record;
        let year = r.year.map(|y| y.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:>3} | {:<4} | {:<10} | {:>4} | {:<24} | {:<60}",
            i + 1,
            year,
            r.frame,
            r.confidence,
            cell(&r.speaker, 24),
            cell(&r.text, 60)
        );
    }

    println!("\n--- Glosses ---");
    for (i, row) in rows.iter().enumerate() {
        println!("{:>3}. {}", i + 1, row.record.gloss);
    }

    println!("\n{} excerpts", rows.len());
}

/// One table cell: whitespace runs collapse to a space, and text past
/// `width` chars is cut with an ellipsis.
fn cell(s: &str, width: usize) -> String {
    let flat = s.split_whitespace().join(" ");
    if flat.chars().count() <= width {
        return flat;
    }
    let mut clipped: String = flat.chars().take(width.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}
