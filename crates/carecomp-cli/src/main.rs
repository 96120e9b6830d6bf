mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    competency::CompetencySubcommand, config::ConfigSubcommand, facility::FacilitySubcommand,
    org::OrgSubcommand, staff::StaffSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "carecomp",
    about = "Compliance tracking for care facilities: orgs, staff, competencies, and assignments",
    version,
    propagate_version = true
)]
struct Cli {
    /// Instance root (default: auto-detect from .carecomp/)
    #[arg(long, global = true, env = "CARECOMP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a carecomp instance in the current directory
    Init {
        /// Create a first organization with this name
        #[arg(long, requires = "admin_email")]
        org_name: Option<String>,
        /// Admin email for the first organization
        #[arg(long, requires = "org_name")]
        admin_email: Option<String>,
    },

    /// Run the HTTP API server
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind (default: server.bind from config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Inspect and validate the instance configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Manage organizations, members, and feature flags
    Org {
        #[command(subcommand)]
        subcommand: OrgSubcommand,
    },

    /// Manage facilities
    Facility {
        #[command(subcommand)]
        subcommand: FacilitySubcommand,
    },

    /// Manage staff records
    Staff {
        #[command(subcommand)]
        subcommand: StaffSubcommand,
    },

    /// Manage competency templates
    Competency {
        #[command(subcommand)]
        subcommand: CompetencySubcommand,
    },

    /// Assign a competency to one or more staff members
    Assign {
        /// Organization id
        #[arg(long)]
        org: String,
        /// Competency template id
        #[arg(long)]
        competency: String,
        /// Staff ids (repeatable: --staff a --staff b)
        #[arg(long = "staff", required = true)]
        staff: Vec<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// Show assignment progress for an organization
    Progress {
        /// Organization id
        #[arg(long)]
        org: String,
        /// Limit to one facility
        #[arg(long)]
        facility: Option<String>,
        /// Limit to one staff member
        #[arg(long)]
        staff: Option<String>,
    },

    /// Classify a record by its status and due date
    Status {
        /// Due date (YYYY-MM-DD or timestamp)
        #[arg(long)]
        due: Option<String>,
        /// Raw record status
        #[arg(long)]
        status: Option<String>,
        /// Evaluate as of this date instead of today
        #[arg(long)]
        today: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init {
            org_name,
            admin_email,
        } => cmd::init::run(&root, org_name.as_deref(), admin_email.as_deref(), cli.json),
        Commands::Serve { port, bind } => cmd::serve::run(&root, bind.as_deref(), port),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Org { subcommand } => cmd::org::run(&root, subcommand, cli.json),
        Commands::Facility { subcommand } => cmd::facility::run(&root, subcommand, cli.json),
        Commands::Staff { subcommand } => cmd::staff::run(&root, subcommand, cli.json),
        Commands::Competency { subcommand } => cmd::competency::run(&root, subcommand, cli.json),
        Commands::Assign {
            org,
            competency,
            staff,
            due,
        } => cmd::assign::run(&root, &org, &competency, staff, due, cli.json),
        Commands::Progress {
            org,
            facility,
            staff,
        } => cmd::progress::run(&root, &org, facility, staff, cli.json),
        Commands::Status { due, status, today } => cmd::status::run(
            &root,
            due.as_deref(),
            status.as_deref(),
            today.as_deref(),
            cli.json,
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
