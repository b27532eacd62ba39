//! Read-only commands: listing and item details

use console::style;
use depot_core::{Permission, RepoPath};

use crate::context::Depot;
use crate::display;
use crate::error::{CliError, Result};

/// List the children of a folder
pub fn ls(depot: &Depot, target: &RepoPath, deep: bool, json: bool) -> Result<()> {
    let items = depot.service.list(&depot.principal, target, deep)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("{}", style(format!("Nothing under {}", target)).dim());
        return Ok(());
    }
    print!("{}", display::items_table(&items));
    Ok(())
}

/// Show one item
///
/// An item the user may not read is reported exactly like a missing one.
pub fn stat(depot: &Depot, target: &RepoPath) -> Result<()> {
    let resolved = depot
        .service
        .resolve(&depot.principal, target, Permission::Read)?
        .ok_or_else(|| CliError::not_found(target.to_string()))?;

    print!("{}", display::item_details(&resolved));
    Ok(())
}
