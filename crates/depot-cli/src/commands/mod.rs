//! CLI commands

pub mod acl;
pub mod browse;
pub mod check;
pub mod content;
pub mod repos;
