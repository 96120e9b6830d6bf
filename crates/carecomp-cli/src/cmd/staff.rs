use crate::cmd::open_instance;
use crate::output::{cell, print_json, print_table};
use carecomp_core::staff::{StaffFilter, StaffInput, StaffMember};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum StaffSubcommand {
    /// Add a staff member to a facility
    Add {
        #[arg(long)]
        org: String,
        #[arg(long)]
        facility: String,
        /// Full name
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Job title, e.g. CNA or LPN
        #[arg(long)]
        title: Option<String>,
    },
    /// List staff
    List {
        #[arg(long)]
        org: String,
        #[arg(long)]
        facility: Option<String>,
        /// Include deactivated staff
        #[arg(long)]
        all: bool,
    },
    /// Deactivate a staff member; their records are kept
    Deactivate {
        #[arg(long)]
        org: String,
        id: String,
    },
    /// Reactivate a staff member
    Activate {
        #[arg(long)]
        org: String,
        id: String,
    },
}

pub fn run(root: &Path, subcmd: StaffSubcommand, json: bool) -> anyhow::Result<()> {
    let (_, conn) = open_instance(root)?;
    match subcmd {
        StaffSubcommand::Add {
            org,
            facility,
            name,
            email,
            title,
        } => {
            let s = StaffMember::create(
                &conn,
                &org,
                StaffInput {
                    facility_id: facility,
                    full_name: name,
                    email,
                    job_title: title,
                },
            )?;
            if json {
                print_json(&s)?;
            } else {
                println!("Added staff: {} <{}> ({})", s.full_name, s.email, s.id);
            }
        }
        StaffSubcommand::List { org, facility, all } => {
            let filter = StaffFilter {
                facility_id: facility,
                active_only: !all,
            };
            let list = StaffMember::list(&conn, &org, &filter)?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No staff.");
                return Ok(());
            }
            let rows = list
                .into_iter()
                .map(|s| {
                    vec![
                        s.id,
                        s.full_name,
                        s.email,
                        cell(s.job_title),
                        if s.active { "active" } else { "inactive" }.to_string(),
                    ]
                })
                .collect();
            print_table(&["ID", "NAME", "EMAIL", "TITLE", "STATE"], rows);
        }
        StaffSubcommand::Deactivate { org, id } => set_active(&conn, &org, &id, false, json)?,
        StaffSubcommand::Activate { org, id } => set_active(&conn, &org, &id, true, json)?,
    }
    Ok(())
}

fn set_active(
    conn: &rusqlite::Connection,
    org: &str,
    id: &str,
    active: bool,
    json: bool,
) -> anyhow::Result<()> {
    let s = StaffMember::set_active(conn, org, id, active)?;
    if json {
        print_json(&s)
    } else {
        let state = if s.active { "active" } else { "inactive" };
        println!("{} is now {state}", s.full_name);
        Ok(())
    }
}
