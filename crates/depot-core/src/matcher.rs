//! Include/exclude glob matching for repository paths
//!
//! Patterns are matched against repo-relative paths. `*` and `?` never cross
//! a `/`, `**` spans any number of segments. An include such as `org/**`
//! also accepts the folder `org` itself so that the folder can be browsed.

use glob::{MatchOptions, Pattern};

use crate::error::{CoreError, Result};

/// Pattern that matches every path
pub const ANY_PATH: &str = "**";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    /// `None` for the any-path pattern
    pattern: Option<Pattern>,
    /// `org` for a pattern `org/**`
    folder: Option<Pattern>,
}

impl CompiledPattern {
    fn compile(source: &str) -> Result<Self> {
        let trimmed = source.trim().trim_start_matches('/');
        if trimmed == ANY_PATH {
            return Ok(Self::any());
        }
        let compile = |p: &str| {
            Pattern::new(p).map_err(|e| CoreError::GlobPattern {
                message: format!("invalid glob pattern '{}': {}", source, e),
            })
        };
        let folder = match trimmed.strip_suffix("/**").filter(|p| !p.is_empty()) {
            Some(prefix) => Some(compile(prefix)?),
            None => None,
        };
        Ok(Self {
            source: trimmed.to_string(),
            pattern: Some(compile(trimmed)?),
            folder,
        })
    }

    fn any() -> Self {
        Self {
            source: ANY_PATH.to_string(),
            pattern: None,
            folder: None,
        }
    }

    fn is_any(&self) -> bool {
        self.pattern.is_none()
    }

    fn matches(&self, path: &str) -> bool {
        let Some(pattern) = &self.pattern else {
            return true;
        };
        if let Some(folder) = &self.folder
            && folder.matches_with(path, MATCH_OPTIONS)
        {
            return true;
        }
        pattern.matches_with(path, MATCH_OPTIONS)
    }
}

/// Compiled include/exclude pattern set
#[derive(Debug, Clone)]
pub struct PathMatcher {
    includes: Vec<CompiledPattern>,
    excludes: Vec<CompiledPattern>,
}

impl PathMatcher {
    /// Compile a matcher; empty `includes` means "everything"
    pub fn new<I, E>(includes: I, excludes: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mut compiled_includes = includes
            .into_iter()
            .map(|p| CompiledPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if compiled_includes.is_empty() {
            compiled_includes.push(CompiledPattern::any());
        }
        let compiled_excludes = excludes
            .into_iter()
            .map(|p| CompiledPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            includes: compiled_includes,
            excludes: compiled_excludes,
        })
    }

    /// Matcher accepting every path
    pub fn any() -> Self {
        Self {
            includes: vec![CompiledPattern::any()],
            excludes: Vec::new(),
        }
    }

    /// True when the path is included and not excluded
    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        if self.excludes.iter().any(|p| p.matches(path)) {
            return false;
        }
        self.includes.iter().any(|p| p.matches(path))
    }

    /// True when the include set contains the any-path pattern and nothing is excluded
    pub fn accepts_any_path(&self) -> bool {
        self.excludes.is_empty() && self.includes.iter().any(CompiledPattern::is_any)
    }

    /// True when the path is rejected by an exclude pattern
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        self.excludes.iter().any(|p| p.matches(path))
    }

    pub fn include_patterns(&self) -> Vec<&str> {
        self.includes.iter().map(|p| p.source.as_str()).collect()
    }
}
