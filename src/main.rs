mod db;
mod error;
mod export;
mod parser;
mod pipeline;
mod pivot;
mod settings;
mod source;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use export::{CsvWriter, SqliteWriter, TableWriter, XlsxWriter};
use parser::dates::{is_date_line, parse_flexible_date};
use parser::records;
use parser::segment::strip_separators;
use settings::{DateStyle, GroupingMode, OutputFormat, Overrides, Settings};

#[derive(Parser)]
#[command(name = "diary_tables", about = "Turn diary-style documents into a wide per-day table")]
struct Cli {
    /// YAML settings file (optional; DIARY_* variables also apply)
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Date style for ambiguous numeric dates
    #[arg(long, global = true)]
    date_style: Option<DateStyle>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every participant folder, pivot and export
    Run {
        /// Folder with one sub-folder per participant
        #[arg(short, long)]
        main_folder: Option<PathBuf>,
        /// Where exported tables are written
        #[arg(short, long)]
        output_folder: Option<PathBuf>,
        /// Split output by month, week or none
        #[arg(short, long)]
        grouping: Option<GroupingMode>,
        /// xlsx, csv or sqlite
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },
    /// Show blocks and records found in one participant folder
    Inspect {
        folder: PathBuf,
        /// Print records as JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Classify and parse a single date string
    CheckDate { text: String },
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

    let mut overrides = Overrides {
        date_format_style: cli.date_style,
        ..Overrides::default()
    };
    if let Commands::Run { main_folder, output_folder, grouping, format } = &cli.command {
        overrides.main_folder = main_folder.clone();
        overrides.output_folder = output_folder.clone();
        overrides.grouping_mode = *grouping;
        overrides.output_format = *format;
    }
    let settings = Settings::load(&cli.config, &overrides)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    tracing::debug!(?settings, "settings loaded");

    let result = match cli.command {
        Commands::Run { .. } => run(&settings),
        Commands::Inspect { folder, json } => inspect(&settings, folder, json),
        Commands::CheckDate { text } => {
            let candidate = strip_separators(&text);
            let parsed = parse_flexible_date(candidate, settings.dayfirst());
            println!("Input:      {:?}", candidate);
            println!("Date line:  {}", is_date_line(candidate));
            println!(
                "Parsed ({}): {}",
                settings.date_format_style,
                parsed.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn run(settings: &Settings) -> anyhow::Result<()> {
    println!("Using {}-style dates", settings.date_format_style);

    let table = pipeline::extract_all(&settings.main_folder, settings.dayfirst())
        .with_context(|| format!("Extraction failed for {}", settings.main_folder.display()))?;

    let participants = {
        let mut ids: Vec<_> = table.rows.iter().map(|r| r.participant_id.as_str()).collect();
        ids.dedup();
        ids.len()
    };
    println!(
        "{} rows, {} participants, {} parameters",
        table.rows.len(),
        participants,
        table.parameters.len()
    );

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut writer: Box<dyn TableWriter> = match settings.output_format {
        OutputFormat::Xlsx => Box::new(XlsxWriter::new(&settings.output_folder, settings.date_format_style, &stamp)?),
        OutputFormat::Csv => Box::new(CsvWriter::new(&settings.output_folder, settings.date_format_style, &stamp)?),
        OutputFormat::Sqlite => Box::new(SqliteWriter::new(&settings.output_folder, settings.date_format_style, &stamp)?),
    };
    let written = export::export(&table, settings.grouping_mode, writer.as_mut())?;
    for target in &written {
        println!("  -> {}", target);
    }
    println!("Wrote {} group(s) ({})", written.len(), settings.grouping_mode.as_str());
    Ok(())
}

fn inspect(settings: &Settings, folder: PathBuf, json: bool) -> anyhow::Result<()> {
    let participant_id = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string());
    let data = pipeline::extract_participant(&folder, &participant_id, settings.dayfirst())?;

    if json {
        for record in &data.records {
            println!("{}", serde_json::to_string(record)?);
        }
        return Ok(());
    }

    for block in &data.blocks {
        let date = parse_flexible_date(&block.date_label, settings.dayfirst())
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        println!("── {} ({}) ──", block.date_label, date);
        for record in records::extract(block) {
            println!("  {:<40} | {}", truncate(&record.parameter, 40), record.value);
        }
    }
    println!(
        "\n{}: {} documents, {} blocks, {} records",
        data.participant_id,
        data.documents,
        data.blocks.len(),
        data.records.len()
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
