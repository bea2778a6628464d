use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod db;
mod matcher;
mod models;
mod record;
mod report;
mod response;
mod schedule;
mod window;

use models::{CheckOutcome, MatchConfig, MatchKind, MatchWindow, DEFAULT_TIME_FIELDS, DISPLAY_FORMAT};

#[derive(Parser)]
#[command(name = "kq-checker")]
#[command(about = "Checks scheduled classes against attendance check-in records", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Match scheduled classes against a saved attendance response
    Check {
        /// Weekly JSON or CSV schedule
        #[arg(long)]
        schedule: PathBuf,
        /// Attendance API response saved as JSON
        #[arg(long)]
        response: PathBuf,
        /// Only check the class starting at this time
        #[arg(long, value_parser = parse_datetime, conflicts_with = "date")]
        at: Option<NaiveDateTime>,
        /// Only check classes on this day
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Store outcomes in the database
        #[arg(long)]
        record: bool,
        #[command(flatten)]
        matching: MatchArgs,
    },
    /// List recently missed classes
    History {
        #[arg(long)]
        course: Option<String>,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        course: Option<String>,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct MatchArgs {
    /// Minutes before class start that a check-in still counts
    #[arg(long, default_value_t = 20)]
    before_minutes: i64,
    /// Minutes after class start that a check-in still counts
    #[arg(long, default_value_t = 5)]
    after_minutes: i64,
    /// Timestamp fields to try, in order (dotted paths for nested fields)
    #[arg(long = "time-field")]
    time_fields: Vec<String>,
    /// Only accept a subject name match as attendance
    #[arg(long)]
    strict: bool,
}

impl MatchArgs {
    fn into_config(self) -> MatchConfig {
        let time_fields = if self.time_fields.is_empty() {
            DEFAULT_TIME_FIELDS.iter().map(|f| f.to_string()).collect()
        } else {
            self.time_fields
        };

        MatchConfig {
            window: MatchWindow {
                before_minutes: self.before_minutes.max(0),
                after_minutes: self.after_minutes.max(0),
            },
            time_fields,
            require_name_match: self.strict,
        }
    }
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    record::parse_timestamp(raw).ok_or_else(|| format!("expected YYYY-MM-DD HH:MM:SS, got {raw:?}"))
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Check {
            schedule,
            response,
            at,
            date,
            record,
            matching,
        } => {
            let config = matching.into_config();
            let events = schedule::load_schedule(&schedule)?;
            let selected = schedule::select_events(&events, at, date);
            if selected.is_empty() {
                println!("No scheduled classes match the selection.");
                return Ok(());
            }

            let records = response::load_response(&response)?;
            let pool = if record { Some(connect().await?) } else { None };
            let mut missed = 0usize;

            for event in &selected {
                let result = matcher::match_event(event, &records, &config);
                let label = match (result.matched, result.kind) {
                    (true, MatchKind::Name) => "attended (name)",
                    (true, _) => "attended (time window)",
                    (false, _) => "MISSED",
                };
                println!(
                    "{} {}: {}",
                    event.start.format(DISPLAY_FORMAT),
                    event.course,
                    label
                );
                for candidate in &result.candidates {
                    match &candidate.room {
                        Some(room) => println!("    {candidate} [{room}]"),
                        None => println!("    {candidate}"),
                    }
                }

                if let Some(notice) = report::render_notice(event, &result) {
                    missed += 1;
                    tracing::warn!(course = %event.course, start = %event.start, "no check-in found");
                    println!();
                    println!("{notice}");
                }

                if let Some(pool) = &pool {
                    db::record_check(pool, &CheckOutcome::from_result(event, &result)).await?;
                }
            }

            println!("Checked {} classes, {} missed.", selected.len(), missed);
        }
        Commands::History {
            course,
            since_days,
            limit,
        } => {
            let pool = connect().await?;
            let since_date = report::cutoff_date(since_days);
            let outcomes = db::fetch_checks(&pool, since_date, course.as_deref()).await?;
            let misses: Vec<_> = outcomes.iter().filter(|o| !o.matched).collect();

            if misses.is_empty() {
                println!("No missed classes found for this window.");
                return Ok(());
            }

            println!("Most recent missed classes:");
            for outcome in misses.iter().take(limit) {
                println!(
                    "- {} at {} ({} candidates)",
                    outcome.course,
                    outcome.event_at.format(DISPLAY_FORMAT),
                    outcome.candidates.len()
                );
            }
        }
        Commands::Report {
            course,
            since_days,
            out,
        } => {
            let pool = connect().await?;
            let since_date = report::cutoff_date(since_days);
            let outcomes = db::fetch_checks(&pool, since_date, course.as_deref()).await?;
            let report = report::build_report(course.as_deref(), since_days, since_date, &outcomes);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
