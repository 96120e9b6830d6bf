use crate::cmd::open_instance;
use crate::output::{cell, print_json, print_table};
use carecomp_core::facility::{Facility, FacilityInput};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum FacilitySubcommand {
    /// Create a facility
    Create {
        /// Organization id
        #[arg(long)]
        org: String,
        name: String,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        /// Licensed bed count
        #[arg(long)]
        beds: Option<u32>,
    },
    /// List facilities of an organization
    List {
        #[arg(long)]
        org: String,
    },
    /// Delete a facility no other record points at
    Delete {
        #[arg(long)]
        org: String,
        id: String,
    },
}

pub fn run(root: &Path, subcmd: FacilitySubcommand, json: bool) -> anyhow::Result<()> {
    let (_, conn) = open_instance(root)?;
    match subcmd {
        FacilitySubcommand::Create {
            org,
            name,
            city,
            state,
            beds,
        } => {
            let f = Facility::create(
                &conn,
                &org,
                FacilityInput {
                    name,
                    city,
                    state,
                    bed_count: beds,
                    ..Default::default()
                },
            )?;
            if json {
                print_json(&f)?;
            } else {
                println!("Created facility: {} ({})", f.name, f.id);
            }
        }
        FacilitySubcommand::List { org } => {
            let list = Facility::list(&conn, &org)?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No facilities.");
                return Ok(());
            }
            let rows = list
                .into_iter()
                .map(|f| vec![f.id, f.name, cell(f.city), cell(f.state), cell(f.bed_count)])
                .collect();
            print_table(&["ID", "NAME", "CITY", "STATE", "BEDS"], rows);
        }
        FacilitySubcommand::Delete { org, id } => {
            Facility::delete(&conn, &org, &id)?;
            if json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                println!("Deleted facility {id}");
            }
        }
    }
    Ok(())
}
