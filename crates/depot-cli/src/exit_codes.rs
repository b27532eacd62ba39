//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Input error - malformed path, permission name or document
pub const INPUT_ERROR: i32 = 2;

/// Not found - unknown repository, item or Acl
pub const NOT_FOUND: i32 = 3;

/// Forbidden - the user lacks the required permission
pub const FORBIDDEN: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Conflict - concurrent modification, busy lock or duplicate name
pub const CONFLICT: i32 = 6;

/// Configuration error (following sysexits.h EX_CONFIG)
pub const CONFIG_ERROR: i32 = 78;
