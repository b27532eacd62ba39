//! Write commands: deploy, folder creation and deletion

use console::style;
use depot_core::RepoPath;
use depot_repo::MutationOutcome;
use std::path::Path;

use crate::context::Depot;
use crate::display::format_size;
use crate::error::{CliError, Result};

fn applied(
    depot: &Depot,
    target: &RepoPath,
    outcome: MutationOutcome,
    action: &str,
) -> Result<RepoPath> {
    match outcome {
        MutationOutcome::Applied { path, .. } => Ok(path),
        MutationOutcome::NotFound => Err(CliError::not_found(target.to_string())),
        MutationOutcome::Forbidden => Err(CliError::forbidden(format!(
            "'{}' may not {} {}",
            depot.principal.username, action, target
        ))),
    }
}

/// Deploy a local file
pub fn put(depot: &Depot, target: &RepoPath, file: &Path) -> Result<()> {
    if target.is_root() {
        return Err(CliError::input_with_help(
            format!("{} names a repository root", target),
            "Give a file path, for example libs-release:org/app/app-1.0.jar",
        ));
    }
    let content = std::fs::read(file)?;
    let outcome = depot.service.deploy(&depot.principal, target, &content)?;
    let path = applied(depot, target, outcome, "deploy to")?;

    println!(
        "{} Deployed {} ({})",
        style("✓").green(),
        path,
        format_size(content.len() as u64)
    );
    Ok(())
}

/// Create a folder and any missing parents
pub fn mkdir(depot: &Depot, target: &RepoPath) -> Result<()> {
    let outcome = depot.service.create_folder(&depot.principal, target)?;
    let path = applied(depot, target, outcome, "create")?;
    println!("{} Created {}", style("✓").green(), path);
    Ok(())
}

/// Delete an item or a whole folder tree
pub fn rm(depot: &Depot, target: &RepoPath) -> Result<()> {
    let outcome = depot.service.delete(&depot.principal, target)?;
    let removed = match &outcome {
        MutationOutcome::Applied { items, .. } => *items,
        _ => 0,
    };
    let path = applied(depot, target, outcome, "delete")?;
    println!(
        "{} Deleted {} ({} item{})",
        style("✓").green(),
        path,
        removed,
        if removed == 1 { "" } else { "s" }
    );
    Ok(())
}
