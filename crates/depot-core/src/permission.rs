//! Permissions and permission bitmasks

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// A single grantable permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Annotate,
    Deploy,
    Delete,
    Manage,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::Read,
        Permission::Annotate,
        Permission::Deploy,
        Permission::Delete,
        Permission::Manage,
    ];

    pub fn bit(self) -> u8 {
        match self {
            Permission::Read => 1,
            Permission::Annotate => 2,
            Permission::Deploy => 4,
            Permission::Delete => 8,
            Permission::Manage => 16,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Annotate => "annotate",
            Permission::Deploy => "deploy",
            Permission::Delete => "delete",
            Permission::Manage => "manage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "read" | "r" => Ok(Permission::Read),
            "annotate" | "n" => Ok(Permission::Annotate),
            "deploy" | "write" | "w" => Ok(Permission::Deploy),
            "delete" | "d" => Ok(Permission::Delete),
            "manage" | "admin" | "m" => Ok(Permission::Manage),
            _ => Err(CoreError::UnknownPermission {
                name: s.to_string(),
            }),
        }
    }
}

/// Set of permissions stored as a bitmask
///
/// Serialized as a list of permission names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PermissionMask(u8);

impl PermissionMask {
    pub const EMPTY: PermissionMask = PermissionMask(0);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1_1111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission.bit();
    }

    pub fn remove(&mut self, permission: Permission) {
        self.0 &= !permission.bit();
    }

    /// Permissions in this mask, in canonical order
    pub fn permissions(self) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|p| self.contains(*p))
            .collect()
    }
}

impl From<Permission> for PermissionMask {
    fn from(p: Permission) -> Self {
        Self(p.bit())
    }
}

impl FromIterator<Permission> for PermissionMask {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut mask = PermissionMask::EMPTY;
        for p in iter {
            mask.insert(p);
        }
        mask
    }
}

impl BitOr for PermissionMask {
    type Output = PermissionMask;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<Permission> for PermissionMask {
    type Output = PermissionMask;

    fn bitor(self, rhs: Permission) -> Self {
        Self(self.0 | rhs.bit())
    }
}

impl BitOrAssign for PermissionMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PermissionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.permissions().iter().map(|p| p.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for PermissionMask {
    type Err = CoreError;

    /// Parse a comma separated list such as `read,deploy`
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Permission::from_str)
            .collect()
    }
}

impl Serialize for PermissionMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.permissions().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PermissionMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let permissions = Vec::<Permission>::deserialize(deserializer)?;
        Ok(permissions.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_operations() {
        let mut mask = PermissionMask::from(Permission::Read) | Permission::Deploy;
        assert!(mask.contains(Permission::Read));
        assert!(mask.contains(Permission::Deploy));
        assert!(!mask.contains(Permission::Delete));

        mask.remove(Permission::Read);
        assert!(!mask.contains(Permission::Read));
        assert_eq!(mask.bits(), 4);
    }

    #[test]
    fn test_parse_list() {
        let mask: PermissionMask = "read, deploy,delete".parse().unwrap();
        assert_eq!(
            mask.permissions(),
            vec![Permission::Read, Permission::Deploy, Permission::Delete]
        );
        assert!("read,fly".parse::<PermissionMask>().is_err());
        assert!("".parse::<PermissionMask>().unwrap().is_empty());
    }

    #[test]
    fn test_display() {
        let mask: PermissionMask = [Permission::Manage, Permission::Read].into_iter().collect();
        assert_eq!(mask.to_string(), "read,manage");
    }

    #[test]
    fn test_serde_as_names() {
        let mask: PermissionMask = "read,annotate".parse().unwrap();
        let yaml = serde_yaml::to_string(&mask).unwrap();
        assert!(yaml.contains("read"));
        assert!(yaml.contains("annotate"));
        let parsed: PermissionMask = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, mask);
    }
}
