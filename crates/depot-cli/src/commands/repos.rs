//! Repository topology commands

use crate::context::Depot;
use crate::display;
use crate::error::{CliError, Result};

/// List configured repositories
pub fn list(depot: &Depot, json: bool) -> Result<()> {
    let topology = depot.service.topology().snapshot();
    let descriptors = topology.descriptors();

    if json {
        println!("{}", serde_json::to_string_pretty(descriptors)?);
        return Ok(());
    }

    if descriptors.is_empty() {
        println!("No repositories configured.");
        println!();
        println!(
            "Add some to {}",
            depot.locations.repositories_file().display()
        );
        return Ok(());
    }

    print!("{}", display::repositories_table(descriptors));
    Ok(())
}

/// Show how a repository key is classified
pub fn classify(depot: &Depot, key: &str, json: bool) -> Result<()> {
    let handle = depot
        .service
        .topology()
        .classify(key)
        .ok_or_else(|| CliError::not_found(format!("repository '{}'", key)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&handle)?);
    } else {
        println!("{}", display::handle_line(&handle));
    }
    Ok(())
}
