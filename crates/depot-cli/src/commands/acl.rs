//! Acl management commands

use console::style;
use depot_acl::Acl;
use std::path::Path;

use crate::context::Depot;
use crate::display;
use crate::error::{CliError, Result};

fn read_acl(file: &Path) -> Result<Acl> {
    let content = std::fs::read_to_string(file)?;
    let acl: Acl = serde_yaml::from_str(&content)?;
    Ok(acl)
}

pub fn list(depot: &Depot, json: bool) -> Result<()> {
    let acls = depot.acls.all()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&acls)?);
        return Ok(());
    }
    if acls.is_empty() {
        println!("No Acls defined.");
        return Ok(());
    }
    print!("{}", display::acls_table(&acls));
    Ok(())
}

/// Print one Acl as YAML, in the shape `acl create` accepts
pub fn show(depot: &Depot, name: &str) -> Result<()> {
    let acl = depot
        .acls
        .get(name)?
        .ok_or_else(|| CliError::not_found(format!("Acl '{}'", name)))?;
    print!(
        "{}",
        serde_yaml::to_string(&acl).map_err(|e| CliError::internal(e.to_string()))?
    );
    Ok(())
}

pub fn create(depot: &Depot, file: &Path) -> Result<()> {
    depot.require_admin("manage Acls")?;
    let acl = read_acl(file)?;
    depot.acls.create(&acl)?;
    println!("{} Created Acl {}", style("✓").green(), acl.name());
    Ok(())
}

pub fn update(depot: &Depot, file: &Path) -> Result<()> {
    depot.require_admin("manage Acls")?;
    let acl = read_acl(file)?;
    depot.acls.update(&acl)?;
    println!("{} Updated Acl {}", style("✓").green(), acl.name());
    Ok(())
}

pub fn delete(depot: &Depot, name: &str) -> Result<()> {
    depot.require_admin("manage Acls")?;
    depot.acls.delete(name)?;
    println!("{} Deleted Acl {}", style("✓").green(), name);
    Ok(())
}

/// Remove every entry granted directly to a user
pub fn revoke_user(depot: &Depot, username: &str) -> Result<()> {
    depot.require_admin("manage Acls")?;
    let changed = depot.acls.remove_all_user_aces(username)?;
    println!(
        "{} Removed {} from {} Acl{}",
        style("✓").green(),
        username,
        changed,
        if changed == 1 { "" } else { "s" }
    );
    Ok(())
}
