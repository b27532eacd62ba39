//! Permission check command

use depot_core::{Permission, RepoPath};

use crate::context::Depot;
use crate::display;
use crate::error::{CliError, Result};

/// Evaluate one permission for the current user
///
/// The path is checked as given; virtual repositories are not resolved.
pub fn run(depot: &Depot, target: &RepoPath, permission: Permission) -> Result<()> {
    let decision = depot
        .service
        .acl()
        .decide(&depot.principal, target, permission)?;

    println!(
        "{} {} on {}: {}",
        depot.principal.username,
        permission,
        target,
        display::decision_line(&decision)
    );

    if decision.granted {
        Ok(())
    } else {
        Err(CliError::forbidden(format!(
            "'{}' does not hold {} on {}",
            depot.principal.username, permission, target
        )))
    }
}
