use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;

use geolife::output::{self, OutputFormat, Table, Tabular};
use geolife::reports::{run_report, ReportKind};
use geolife::{
    scan_trajectory_files, GeoLifeStore, IngestConfig, LabelIndex, Loader, ReportConfig, Result,
};

#[derive(Parser)]
#[command(name = "geolife")]
#[command(author, version, about = "Load GeoLife trajectories into SQLite and report on them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file
    #[arg(long, global = true, env = "GEOLIFE_DB", default_value = "geolife.db")]
    db: PathBuf,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: Format,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum Format {
    #[default]
    Table,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Table => OutputFormat::Table,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Phase {
    Users,
    Activities,
    Trackpoints,
    All,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportName {
    Counts,
    AverageActivities,
    TopUsers,
    TaxiUsers,
    ModeCounts,
    Years,
    WalkedDistance,
    AltitudeGain,
    InvalidActivities,
    ForbiddenCity,
    TopModes,
}

impl From<ReportName> for ReportKind {
    fn from(name: ReportName) -> Self {
        match name {
            ReportName::Counts => ReportKind::Counts,
            ReportName::AverageActivities => ReportKind::AverageActivities,
            ReportName::TopUsers => ReportKind::TopUsers,
            ReportName::TaxiUsers => ReportKind::TaxiUsers,
            ReportName::ModeCounts => ReportKind::ModeCounts,
            ReportName::Years => ReportKind::Years,
            ReportName::WalkedDistance => ReportKind::WalkedDistance,
            ReportName::AltitudeGain => ReportKind::AltitudeGain,
            ReportName::InvalidActivities => ReportKind::InvalidActivities,
            ReportName::ForbiddenCity => ReportKind::ForbiddenCity,
            ReportName::TopModes => ReportKind::TopModes,
        }
    }
}

#[derive(clap::Args)]
struct DatasetArgs {
    /// Directory with one subdirectory per user
    #[arg(long, env = "GEOLIFE_DATA_ROOT", default_value = "dataset/Data")]
    data_root: PathBuf,

    /// File listing the users that have labels
    #[arg(long, env = "GEOLIFE_LABELED_IDS", default_value = "dataset/labeled_ids.txt")]
    labeled_ids: PathBuf,
}

impl DatasetArgs {
    fn config(&self) -> IngestConfig {
        IngestConfig::with_paths(&self.data_root, &self.labeled_ids)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the User, Activity and TrackPoint tables
    Init,
    /// Count valid and invalid trajectory files
    Scan {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
    /// Load the dataset into the database
    Ingest {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Phase to run
        #[arg(long, default_value = "all")]
        phase: Phase,
    },
    /// Run one report of the catalogue
    Report {
        /// Report name
        name: ReportName,
        /// Rows returned by ranking reports
        #[arg(long, default_value = "20")]
        top: u32,
        /// User for walked-distance
        #[arg(long, default_value = "112")]
        user: String,
        /// Year for walked-distance
        #[arg(long, default_value = "2008")]
        year: i32,
        /// Largest allowed gap between points, in minutes
        #[arg(long, default_value = "5")]
        max_gap: i64,
    },
    /// List tables
    Tables,
    /// Show the columns of a table
    Describe {
        /// Table name
        table: String,
    },
    /// Show the first rows of a table
    Peek {
        /// Table name
        table: String,
        /// Number of rows to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
}

#[derive(Serialize)]
struct ScanSummary {
    root: PathBuf,
    files: usize,
    valid: usize,
    invalid: usize,
}

impl Tabular for ScanSummary {
    fn to_table(&self) -> Table {
        let mut table = Table::new(&["root", "files", "valid", "invalid"]);
        table.push_row(vec![
            self.root.display().to_string(),
            self.files.to_string(),
            self.valid.to_string(),
            self.invalid.to_string(),
        ]);
        table
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct TableList(Vec<String>);

impl Tabular for TableList {
    fn to_table(&self) -> Table {
        let mut table = Table::new(&["table"]);
        for name in &self.0 {
            table.push_row(vec![name.clone()]);
        }
        table
    }
}

fn print<T: Tabular + Serialize>(value: &T, format: Format) -> Result<()> {
    println!("{}", output::render(value, format.into())?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut store = GeoLifeStore::new(&cli.db)?;

    match cli.command {
        Commands::Init => {
            store.create_tables()?;
            info!("[Cli] Tables ready in {}", cli.db.display());
            print(&TableList(store.table_names()?), cli.format)
        }
        Commands::Scan { dataset } => {
            let valid = scan_trajectory_files(&dataset.config())?;
            print(
                &ScanSummary {
                    root: valid.root().to_path_buf(),
                    files: valid.len(),
                    valid: valid.valid_count(),
                    invalid: valid.invalid_count(),
                },
                cli.format,
            )
        }
        Commands::Ingest { dataset, phase } => {
            let config = dataset.config();
            config.validate()?;
            let valid = scan_trajectory_files(&config)?;
            let labels = LabelIndex::load(&config.labeled_ids_path)?;
            let loader = Loader::new(&config, &valid, &labels);

            match phase {
                Phase::All => print(&loader.load_all(&mut store)?, cli.format),
                Phase::Users => print(&loader.load_users(&mut store)?, cli.format),
                Phase::Activities => print(&loader.load_activities(&mut store)?, cli.format),
                Phase::Trackpoints => print(&loader.load_trackpoints(&mut store)?, cli.format),
            }
        }
        Commands::Report {
            name,
            top,
            user,
            year,
            max_gap,
        } => {
            let config = ReportConfig {
                top_n: top,
                walk_user: user,
                walk_year: year,
                max_gap_minutes: max_gap,
            };
            let output = run_report(store.connection(), name.into(), &config)?;
            print(&output, cli.format)
        }
        Commands::Tables => print(&TableList(store.table_names()?), cli.format),
        Commands::Describe { table } => print(&store.describe_table(&table)?, cli.format),
        Commands::Peek { table, limit } => print(&store.peek_table(&table, limit)?, cli.format),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }
}
