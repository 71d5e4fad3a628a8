//! Repair Planner
//!
//! Plans the repair order of damaged connection segments and groups the
//! buildings they serve into work phases.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use repair_planner::config::{LoaderOptions, PlannerConfig};
use repair_planner::phases::ResidentialOrder;
use repair_planner::report::{PhaseListing, PlanListing};
use repair_planner::{PlanError, db, loader, planner};

#[derive(Parser)]
#[command(name = "repair-planner")]
#[command(about = "Repair order and work phases for damaged connection infrastructure")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "repair_plans.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan repairs and phases from CSV exports (files or directories)
    Plan {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Also write CSV reports into this directory
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Workers per segment (capped at 4)
        #[arg(long, default_value = "4")]
        crew: u32,

        /// Hourly labor cost
        #[arg(long, default_value = "37.5")]
        wage: f64,

        /// Hospital reconnection deadline in hours
        #[arg(long, default_value = "16")]
        deadline: f64,

        /// Share of the non-hospital cost phase 1 must reach
        #[arg(long, default_value = "0.4")]
        phase1_share: f64,

        /// Target share of the non-hospital cost for each of phases 2-4
        #[arg(long, default_value = "0.2")]
        bucket_share: f64,

        /// Residential priority: difficulty, cost-descending or cost-ascending
        #[arg(long, default_value = "difficulty")]
        residential_order: ResidentialOrder,

        /// Keep rows flagged intact (their buildings get a no-repair step)
        #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
        keep_intact: bool,

        /// Do not store the run in the database
        #[arg(long)]
        no_save: bool,
    },

    /// Show the repair plan of the latest stored run
    ShowPlan,

    /// Show the phase table of the latest stored run
    ShowPhases,

    /// Initialize empty database with schema
    Init,

    /// Delete every stored run
    Clear,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repair_planner=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Plan {
            inputs,
            export,
            crew,
            wage,
            deadline,
            phase1_share,
            bucket_share,
            residential_order,
            keep_intact,
            no_save,
        } => {
            let mut config = PlannerConfig::default();
            config.cost.crew_size = crew;
            config.cost.hourly_wage = wage;
            config.phases.deadline_hours = deadline;
            config.phases.phase1_share = phase1_share;
            config.phases.bucket_share = bucket_share;
            config.phases.residential_order = residential_order;
            config.loader = LoaderOptions { keep_intact };

            let rows = loader::load_inputs(&inputs, &config.loader)?;
            let report = match planner::plan(&rows, &config) {
                Ok(report) => report,
                Err(PlanError::UnresolvableSegment {
                    buildings,
                    segments,
                    partial,
                }) => {
                    println!("Partial repair plan:\n");
                    println!("{}", PlanListing(&partial));
                    println!("Unresolved buildings: {}", buildings.join(", "));
                    println!("Segments serving no house: {}", segments.join(", "));
                    println!("\nFix the house counts of these segments and re-run.");
                    return Ok(ExitCode::FAILURE);
                }
                Err(e) => return Err(e.into()),
            };

            println!("{}", report.repair);
            println!("{}", report.phases.compliance);
            println!("{}", report.phases);

            if !no_save {
                let label = inputs
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let run_id = db::save_report(&mut conn, &label, &report)?;
                println!("Stored as run {} in {}", run_id, cli.database.display());
            }

            if let Some(dir) = export {
                for path in repair_planner::report::export_csv(&report, &dir)? {
                    println!("Wrote {}", path.display());
                }
            }
        }

        Commands::ShowPlan => match db::latest_run(&conn)? {
            Some(run_id) => {
                let entries = db::load_plan(&conn, run_id)?;
                println!("Run {}:\n", run_id);
                println!("{}", PlanListing(&entries));
            }
            None => println!("No runs in database. Run 'plan' first."),
        },

        Commands::ShowPhases => match db::latest_run(&conn)? {
            Some(run_id) => {
                let phases = db::load_phases(&conn, run_id)?;
                println!("Run {}:\n", run_id);
                if let Some(compliance) = db::load_compliance(&conn, run_id)? {
                    println!("{}", compliance);
                }
                println!("{}", PhaseListing(&phases));
            }
            None => println!("No runs in database. Run 'plan' first."),
        },

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Clear => {
            db::clear_results(&conn)?;
            println!("Stored runs cleared.");
        }
    }

    Ok(ExitCode::SUCCESS)
}
