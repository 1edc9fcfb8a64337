//! sheetgrade - batch grader for spreadsheet assignments
//!
//! Reads one workbook snapshot per student, grades every tab against a single
//! exchange-rate snapshot, and writes per-student results plus a summary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use sheetgrade::application::{grade_batch, student_name_from_stem, Submission};
use sheetgrade::domain::{CountryDirectory, RateSnapshot};
use sheetgrade::infrastructure::{FileRepository, GraderConfig, RatesClient};
use sheetgrade::presentation::{init_tracing, render_report, TemplateRenderer};

#[derive(Parser, Debug)]
#[command(name = "sheetgrade")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "SHEETGRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Explicit log filter (e.g. `info` or `sheetgrade=trace`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grade every snapshot in a directory
    Grade {
        /// Directory of `.json` / `.csv` workbook snapshots
        submissions: PathBuf,

        /// Where results are written
        #[arg(long, short)]
        out: PathBuf,

        /// Use a saved rate table instead of fetching live rates
        #[arg(long)]
        rates_file: Option<PathBuf>,

        /// Also write rendered feedback text per student
        #[arg(long)]
        render: bool,

        /// Grade as of this date (YYYY-MM-DD) instead of today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Fetch the live rate table and report its size
    CheckRates,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json) {
        eprintln!("Warning: Failed to initialize logging: {err}");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = GraderConfig::load_or_default(cli.config.as_deref())?;

    match &cli.command {
        Command::Grade {
            submissions,
            out,
            rates_file,
            render,
            today,
        } => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            grade(&config, submissions, out, rates_file.as_deref(), *render, today)
        }
        Command::CheckRates => {
            let client = RatesClient::from_config(&config);
            let table = client.fetch()?;
            println!("{}: {} currencies", client.url(), table.len());
            Ok(())
        }
    }
}

fn grade(
    config: &GraderConfig,
    submissions_dir: &Path,
    out: &Path,
    rates_file: Option<&Path>,
    render: bool,
    today: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let renderer = match (&config.templates, render) {
        (Some(path), true) => TemplateRenderer::load(path)?,
        _ => TemplateRenderer::default(),
    };

    let submissions: Vec<Submission> = FileRepository::discover_submissions(submissions_dir)?
        .into_iter()
        .filter_map(|path| {
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            let student = student_name_from_stem(&stem, &config.submission_suffix);
            match FileRepository::load_workbook(&path) {
                Ok(workbook) => Some(Submission::new(student, workbook)),
                Err(err) => {
                    tracing::warn!(student, error = %err, "skipping unreadable submission");
                    None
                }
            }
        })
        .collect();

    // One snapshot for the whole batch.
    let rates: RateSnapshot = match rates_file {
        Some(path) => FileRepository::load_rate_snapshot(path),
        None => RatesClient::from_config(config).fetch(),
    };

    let reports = grade_batch(&submissions, today, &rates, CountryDirectory::builtin());

    FileRepository::ensure_dir(out)?;
    for report in &reports {
        FileRepository::save_report(report, out)?;
        if render {
            FileRepository::save_feedback_text(&report.student, &render_report(report, &renderer), out)?;
        }
    }

    let summary: Vec<_> = reports.iter().map(|report| report.summary()).collect();
    FileRepository::write_summary(&summary, &out.join("summary.csv"))?;

    tracing::info!(students = reports.len(), out = %out.display(), "batch complete");
    println!("Graded {} submissions into {}", reports.len(), out.display());
    Ok(())
}
