use std::collections::BTreeMap;
use std::fs::{File, read_to_string};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use shiftplan::{
    BackendKind, CoverageReport, ObjectiveForm, Overrides, PlanConfig, Table, Unavailability,
    UnavailabilityMode, configured_backend, normalize, solve_request,
};

#[derive(Parser)]
#[command(
    name = "shiftplan",
    about = "Assign staff to dates under coverage and preference constraints",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a staffing problem and write the schedule as CSV
    Solve {
        #[command(flatten)]
        input: InputArgs,
        /// Write the schedule here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the normalized staff and calendar data
    Inspect {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Staff table (staff_id, leader, min_days, max_days[, penalty][, unavailable])
    #[arg(long)]
    staff: PathBuf,
    /// Calendar table (date, required_staff, required_leaders)
    #[arg(long)]
    calendar: PathBuf,
    /// YAML run configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// YAML map of staff_id to penalty weight, covering every staff member
    #[arg(long)]
    penalties: Option<PathBuf>,
    /// YAML map of staff_id to unavailable date (or `none`), covering every staff member
    #[arg(long)]
    unavailable: Option<PathBuf>,
    /// strict or penalized
    #[arg(long)]
    unavailability: Option<UnavailabilityMode>,
    /// linear or quadratic
    #[arg(long)]
    objective: Option<ObjectiveForm>,
    /// Cost of each shift worked on a requested day off (penalized mode)
    #[arg(long)]
    off_penalty: Option<f64>,
    /// Weight for staff without a penalty value
    #[arg(long)]
    default_penalty: Option<u32>,
    /// microlp or cbc
    #[arg(long)]
    backend: Option<BackendKind>,
    /// Give up after this many seconds
    #[arg(long)]
    time_limit: Option<u64>,
}

impl InputArgs {
    fn config(&self) -> anyhow::Result<PlanConfig> {
        let mut config = match &self.config {
            Some(path) => PlanConfig::from_yaml_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => PlanConfig::default(),
        };
        if let Some(mode) = self.unavailability {
            config.unavailability = mode;
        }
        if let Some(form) = self.objective {
            config.objective = form;
        }
        if let Some(off_penalty) = self.off_penalty {
            config.off_penalty = off_penalty;
        }
        if let Some(default_penalty) = self.default_penalty {
            config.default_penalty = default_penalty;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(secs) = self.time_limit {
            config.time_limit_secs = Some(secs);
        }
        Ok(config)
    }

    fn overrides(&self) -> anyhow::Result<Overrides> {
        let mut overrides = Overrides::default();
        if let Some(path) = &self.penalties {
            let buf = read_to_string(path)?;
            let penalties: BTreeMap<String, u32> = serde_yaml::from_str(&buf)
                .with_context(|| format!("parsing penalties {}", path.display()))?;
            overrides = overrides.with_penalties(penalties);
        }
        if let Some(path) = &self.unavailable {
            let buf = read_to_string(path)?;
            let unavailable: BTreeMap<String, Unavailability> = serde_yaml::from_str(&buf)
                .with_context(|| format!("parsing unavailable dates {}", path.display()))?;
            overrides = overrides.with_unavailable(unavailable);
        }
        Ok(overrides)
    }

    fn tables(&self) -> anyhow::Result<(Table, Table)> {
        let staff = Table::from_csv_path(&self.staff)
            .with_context(|| format!("reading staff table {}", self.staff.display()))?;
        let calendar = Table::from_csv_path(&self.calendar)
            .with_context(|| format!("reading calendar table {}", self.calendar.display()))?;
        Ok((staff, calendar))
    }
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shiftplan=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve { input, output } => solve(&input, output),
        Commands::Inspect { input } => inspect(&input),
    }
}

fn solve(input: &InputArgs, output: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let config = input.config()?;
    let (staff, calendar) = input.tables()?;
    let request = normalize(&staff, &calendar, &input.overrides()?, config.default_penalty)?;
    let backend = configured_backend(&config)?;

    let outcome = solve_request(&request, &config, backend.as_ref());

    eprintln!("status: {}", outcome.status);
    match outcome.objective {
        Some(objective) => eprintln!("objective: {objective}"),
        None => eprintln!("objective: undefined"),
    }
    if let Some(message) = &outcome.message {
        eprintln!("message: {message}");
    }

    let Some(schedule) = outcome.schedule else {
        return Ok(ExitCode::FAILURE);
    };
    eprintln!("\n{}", CoverageReport::new(&request, &schedule));

    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating output {}", path.display()))?;
            schedule.write_csv(file)?;
        }
        None => schedule.write_csv(std::io::stdout().lock())?,
    }
    Ok(ExitCode::SUCCESS)
}

fn inspect(input: &InputArgs) -> anyhow::Result<ExitCode> {
    let config = input.config()?;
    let (staff, calendar) = input.tables()?;
    let request = normalize(&staff, &calendar, &input.overrides()?, config.default_penalty)?;

    println!("{request}");
    println!(
        "unavailability: {}, objective: {}, off penalty: {}, backend: {}",
        config.unavailability, config.objective, config.off_penalty, config.backend
    );
    Ok(ExitCode::SUCCESS)
}
