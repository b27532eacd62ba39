//! Display formatting for CLI output
//!
//! Renderers return plain strings; styling is applied by `console` and
//! disappears automatically when stdout is not a terminal.

use console::style;
use depot_acl::{Acl, Decision};
use depot_core::{RepoDescriptor, RepoKind};
use depot_repo::{AggregatedItem, RepositoryHandle, ResolvedItem};
use std::fmt::Write;

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = None;
    for candidate in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = Some(candidate);
    }
    match unit {
        Some(unit) => format!("{:.2} {}", value, unit),
        None => format!("{} B", bytes),
    }
}

/// Append one table row without trailing padding
fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn descriptor_details(descriptor: &RepoDescriptor) -> String {
    match &descriptor.kind {
        RepoKind::Local => String::new(),
        RepoKind::Remote {
            url,
            store_artifacts_locally,
        } => {
            if *store_artifacts_locally {
                format!("{} (cache {})", url, descriptor.cache_key().unwrap_or_default())
            } else {
                url.clone()
            }
        }
        RepoKind::Virtual {
            repositories,
            default_deployment_repo,
        } => {
            let mut details = format!("[{}]", repositories.join(", "));
            if let Some(target) = default_deployment_repo {
                let _ = write!(details, " deploy to {}", target);
            }
            details
        }
    }
}

/// Table of configured repositories
pub fn repositories_table(descriptors: &[RepoDescriptor]) -> String {
    let mut out = String::new();
    push_row(&mut out, format!("{:<24} {:<8} {}", "KEY", "TYPE", "DETAILS"));
    for descriptor in descriptors {
        push_row(
            &mut out,
            format!(
                "{:<24} {:<8} {}",
                descriptor.key,
                descriptor.type_name(),
                descriptor_details(descriptor)
            ),
        );
    }
    out
}

/// One-line description of a classified repository
pub fn handle_line(handle: &RepositoryHandle) -> String {
    match handle {
        RepositoryHandle::Local { key } => format!("{}: local", key),
        RepositoryHandle::Cache { key, remote } => format!("{}: cache of remote {}", key, remote),
        RepositoryHandle::Remote { key, url, cache } => match cache {
            Some(cache) => format!("{}: remote {} cached in {}", key, url, cache),
            None => format!("{}: remote {} without local cache", key, url),
        },
        RepositoryHandle::Virtual {
            key,
            members,
            default_deployment,
        } => {
            let mut line = format!("{}: virtual over [{}]", key, members.join(", "));
            if let Some(target) = default_deployment {
                let _ = write!(line, ", deploys to {}", target);
            }
            line
        }
    }
}

/// Listing of aggregated children
pub fn items_table(items: &[AggregatedItem]) -> String {
    let mut out = String::new();
    push_row(&mut out, format!("{:<32} {:<6} {}", "NAME", "TYPE", "REPOSITORIES"));
    for item in items {
        let name = if item.folder {
            format!("{}/", item.name)
        } else {
            item.name.clone()
        };
        let repos: Vec<&str> = item.repo_keys.iter().map(String::as_str).collect();
        push_row(
            &mut out,
            format!(
                "{:<32} {:<6} {}",
                name,
                if item.folder { "folder" } else { "file" },
                repos.join(", ")
            ),
        );
    }
    out
}

/// Detail view of one resolved item
pub fn item_details(resolved: &ResolvedItem) -> String {
    let item = &resolved.item;
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {}", "Path:", resolved.requested);
    if resolved.physical() != &resolved.requested {
        let _ = writeln!(out, "{:<10} {}", "Stored in:", resolved.physical());
    }
    let _ = writeln!(
        out,
        "{:<10} {}",
        "Type:",
        if item.folder { "folder" } else { "file" }
    );
    if !item.folder {
        let _ = writeln!(out, "{:<10} {}", "Size:", format_size(item.size));
        if let Some(sha256) = &item.sha256 {
            let _ = writeln!(out, "{:<10} {}", "SHA-256:", sha256);
        }
    }
    let _ = writeln!(
        out,
        "{:<10} {}",
        "Created:",
        item.created.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out
}

/// Table of Acls with their grants
pub fn acls_table(acls: &[Acl]) -> String {
    let mut out = String::new();
    push_row(&mut out, format!("{:<20} {:<28} {}", "NAME", "REPOSITORIES", "GRANTS"));
    for acl in acls {
        let repos: Vec<&str> = acl.target.repo_keys.iter().map(String::as_str).collect();
        let grants: Vec<String> = acl
            .aces
            .iter()
            .map(|ace| format!("{}={}", ace.sid, ace.permissions))
            .collect();
        push_row(
            &mut out,
            format!(
                "{:<20} {:<28} {}",
                acl.name(),
                repos.join(","),
                grants.join(" ")
            ),
        );
    }
    out
}

/// Outcome of a permission check
pub fn decision_line(decision: &Decision) -> String {
    match (&decision.level, decision.granted) {
        (Some(level), true) => format!("{} ({})", style("granted").green(), level),
        (Some(level), false) => format!(
            "{} (decided at {}, holds {})",
            style("denied").red(),
            level,
            if decision.mask.is_empty() {
                "nothing".to_string()
            } else {
                decision.mask.to_string()
            }
        ),
        (None, _) => format!("{} (no matching Acl)", style("denied").red()),
    }
}
