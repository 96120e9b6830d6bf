use crate::cmd::open_instance;
use crate::output::{print_json, print_table};
use carecomp_core::competency::{CompetencyFilter, CompetencyInput, CompetencyTemplate};
use carecomp_core::types::RiskLevel;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum CompetencySubcommand {
    /// Create a competency template
    Create {
        #[arg(long)]
        org: String,
        title: String,
        /// Low, Medium, High, or Critical
        #[arg(long, default_value = "Medium")]
        risk: String,
        /// Roles the competency applies to (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,
    },
    /// List competency templates
    List {
        #[arg(long)]
        org: String,
        /// Only this risk level
        #[arg(long)]
        risk: Option<String>,
        /// Only templates that apply to this role
        #[arg(long)]
        role: Option<String>,
        /// Include archived templates
        #[arg(long)]
        archived: bool,
    },
    /// Archive a template so it is no longer offered
    Archive {
        #[arg(long)]
        org: String,
        id: String,
    },
}

pub fn run(root: &Path, subcmd: CompetencySubcommand, json: bool) -> anyhow::Result<()> {
    let (_, conn) = open_instance(root)?;
    match subcmd {
        CompetencySubcommand::Create {
            org,
            title,
            risk,
            roles,
        } => {
            let risk_level: RiskLevel = risk.parse()?;
            let c = CompetencyTemplate::create(
                &conn,
                &org,
                CompetencyInput {
                    title,
                    risk_level,
                    applicable_roles: roles.into_iter().collect(),
                    setting: None,
                    language: None,
                    sections: Default::default(),
                },
            )?;
            if json {
                print_json(&c)?;
            } else {
                println!("Created competency: {} [{}] ({})", c.title, c.risk_level, c.id);
            }
        }
        CompetencySubcommand::List {
            org,
            risk,
            role,
            archived,
        } => {
            let filter = CompetencyFilter {
                risk_level: risk.as_deref().map(str::parse::<RiskLevel>).transpose()?,
                role,
                include_archived: archived,
            };
            let list = CompetencyTemplate::list(&conn, &org, &filter)?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No competencies.");
                return Ok(());
            }
            let rows = list
                .into_iter()
                .map(|c| {
                    let roles: Vec<String> = c.applicable_roles.into_iter().collect();
                    vec![c.id, c.title, c.risk_level.to_string(), roles.join(", ")]
                })
                .collect();
            print_table(&["ID", "TITLE", "RISK", "ROLES"], rows);
        }
        CompetencySubcommand::Archive { org, id } => {
            let c = CompetencyTemplate::set_archived(&conn, &org, &id, true)?;
            if json {
                print_json(&c)?;
            } else {
                println!("Archived {}", c.title);
            }
        }
    }
    Ok(())
}
