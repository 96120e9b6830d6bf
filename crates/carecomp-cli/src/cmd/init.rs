use crate::output::print_json;
use anyhow::Context;
use carecomp_core::config::Config;
use carecomp_core::org::{Membership, Organization};
use carecomp_core::types::Role;
use carecomp_core::{db, io, paths};
use std::path::Path;

pub fn run(
    root: &Path,
    org_name: Option<&str>,
    admin_email: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let instance_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "carecomp".to_string());

    if !json {
        println!("Initializing carecomp in: {}", root.display());
    }

    let dir = paths::carecomp_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config = if paths::config_path(root).exists() {
        if !json {
            println!("  exists:  {}", paths::CONFIG_FILE);
        }
        Config::load(root).context("failed to load config.yaml")?
    } else {
        let cfg = Config::new(&instance_name);
        cfg.save(root).context("failed to write config.yaml")?;
        if !json {
            println!("  created: {}", paths::CONFIG_FILE);
        }
        cfg
    };

    let conn = db::open(root).context("failed to open store")?;
    if !json {
        println!(
            "  store:   {} (schema v{})",
            paths::DB_FILE,
            db::schema_version(&conn)?
        );
    }

    let org = match (org_name, admin_email) {
        (Some(name), Some(email)) => {
            let tx = conn.unchecked_transaction()?;
            let org = Organization::create(&tx, name, config.default_flags.clone())?;
            let admin = Membership::upsert(&tx, &org.id, email, Role::Admin)?;
            tx.commit()?;
            tracing::info!(org = %org.id, admin = %admin.email, "organization created");
            if !json {
                println!("  org:     {} ({})", org.name, org.id);
                println!("  admin:   {}", admin.email);
            }
            Some(org)
        }
        _ => None,
    };

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "instance": config.instance.name,
            "organization": org,
        }))?;
    }
    Ok(())
}
