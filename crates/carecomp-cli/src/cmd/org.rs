use crate::cmd::open_instance;
use crate::output::{print_json, print_table};
use anyhow::Context;
use carecomp_core::gate::effective_flags;
use carecomp_core::org::{Membership, Organization};
use carecomp_core::types::Role;
use clap::Subcommand;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Subcommand)]
pub enum OrgSubcommand {
    /// Create an organization with a first admin
    Create {
        name: String,
        /// Email of the first admin
        #[arg(long)]
        admin_email: String,
    },
    /// List organizations
    List,
    /// Show an organization with its resolved feature flags
    Show { org: String },
    /// List members of an organization
    Members { org: String },
    /// Add a member or change their role
    AddMember {
        org: String,
        email: String,
        /// staff, manager, admin, or dev
        #[arg(long, default_value = "staff")]
        role: String,
    },
    /// Remove a member
    RemoveMember { org: String, email: String },
    /// Switch modules on or off (e.g. drills=off tracks=on)
    Flags {
        org: String,
        /// module=on|off pairs
        #[arg(required = true)]
        settings: Vec<String>,
    },
    /// Mark or unmark an organization as a development org
    Dev {
        org: String,
        #[arg(long)]
        off: bool,
    },
}

pub fn run(root: &Path, subcmd: OrgSubcommand, json: bool) -> anyhow::Result<()> {
    let (config, conn) = open_instance(root)?;
    match subcmd {
        OrgSubcommand::Create { name, admin_email } => {
            let tx = conn.unchecked_transaction()?;
            let org = Organization::create(&tx, &name, config.default_flags.clone())?;
            Membership::upsert(&tx, &org.id, &admin_email, Role::Admin)?;
            tx.commit()?;
            tracing::info!(org = %org.id, "organization created");
            if json {
                print_json(&org)?;
            } else {
                println!("Created organization: {} ({})", org.name, org.id);
            }
        }
        OrgSubcommand::List => {
            let orgs = Organization::list(&conn)?;
            if json {
                return print_json(&orgs);
            }
            if orgs.is_empty() {
                println!("No organizations.");
                return Ok(());
            }
            let rows = orgs
                .iter()
                .map(|o| {
                    vec![
                        o.id.clone(),
                        o.name.clone(),
                        if o.is_dev_org { "yes" } else { "" }.to_string(),
                    ]
                })
                .collect();
            print_table(&["ID", "NAME", "DEV"], rows);
        }
        OrgSubcommand::Show { org } => {
            let org = Organization::load(&conn, &org)?;
            let flags = effective_flags(&org.feature_flags, org.is_dev_org);
            if json {
                return print_json(&serde_json::json!({
                    "organization": org,
                    "feature_flags": flags,
                }));
            }
            println!("{} ({})", org.name, org.id);
            if org.is_dev_org {
                println!("development org: all modules shown as on");
            }
            let rows = flags
                .iter()
                .map(|(m, on)| vec![m.to_string(), if *on { "on" } else { "off" }.to_string()])
                .collect();
            print_table(&["MODULE", "ENABLED"], rows);
        }
        OrgSubcommand::Members { org } => {
            let members = Membership::list(&conn, &org)?;
            if json {
                return print_json(&members);
            }
            let rows = members
                .iter()
                .map(|m| vec![m.email.clone(), m.role.to_string()])
                .collect();
            print_table(&["EMAIL", "ROLE"], rows);
        }
        OrgSubcommand::AddMember { org, email, role } => {
            let role: Role = role.parse()?;
            let m = Membership::upsert(&conn, &org, &email, role)?;
            if json {
                print_json(&m)?;
            } else {
                println!("{} is now {} in {}", m.email, m.role, m.org_id);
            }
        }
        OrgSubcommand::RemoveMember { org, email } => {
            Membership::remove(&conn, &org, &email)?;
            if json {
                print_json(&serde_json::json!({ "removed": email }))?;
            } else {
                println!("Removed {email}");
            }
        }
        OrgSubcommand::Flags { org, settings } => {
            let updates = parse_flag_settings(&settings)?;
            let mut org = Organization::load(&conn, &org)?;
            org.set_flags(&conn, &updates)?;
            let resolved = org.feature_flags.resolved();
            if json {
                print_json(&resolved)?;
            } else {
                for (m, on) in &resolved {
                    println!("{m}: {}", if *on { "on" } else { "off" });
                }
            }
        }
        OrgSubcommand::Dev { org, off } => {
            let mut org = Organization::load(&conn, &org)?;
            org.set_dev_org(&conn, !off)?;
            if json {
                print_json(&org)?;
            } else {
                println!("{}: development org {}", org.name, if off { "off" } else { "on" });
            }
        }
    }
    Ok(())
}

fn parse_flag_settings(settings: &[String]) -> anyhow::Result<BTreeMap<String, bool>> {
    settings
        .iter()
        .map(|s| {
            let (module, value) = s
                .split_once('=')
                .with_context(|| format!("expected module=on|off, got '{s}'"))?;
            let enabled = match value.trim().to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => true,
                "off" | "false" | "0" => false,
                other => anyhow::bail!("invalid flag value '{other}' for {module}"),
            };
            Ok((module.trim().to_string(), enabled))
        })
        .collect()
}
