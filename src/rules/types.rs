//! Type definitions shared by the search rules.
//!
//! - [`SearchPattern`] - one regex with its selectivity estimate
//! - [`SearchLocation`] - where in the tree a rule expects its code
//! - [`ClauseType`] - which SQL clause a pattern stands for
//! - [`RuleInfo`] - rule identification

use serde::Serialize;

/// SQL clause a pattern mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseType {
    Limit,
    Offset,
    Order,
    Scope,
    /// Bare `Model.method` reference
    Model,
    Association,
    Write
}

impl std::fmt::Display for ClauseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Offset => write!(f, "offset"),
            Self::Order => write!(f, "order"),
            Self::Scope => write!(f, "scope"),
            Self::Model => write!(f, "model"),
            Self::Association => write!(f, "association"),
            Self::Write => write!(f, "write")
        }
    }
}

/// A regex a rule wants searched.
///
/// Distinctiveness is a design-time guess at how selective the pattern is.
/// Higher values are searched first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPattern {
    pub pattern:         String,
    pub distinctiveness: f64,
    pub clause_type:     ClauseType,
    /// Optional patterns never exclude a file
    pub optional:        bool
}

impl SearchPattern {
    pub fn required(pattern: impl Into<String>, distinctiveness: f64, clause_type: ClauseType) -> Self {
        Self {
            pattern:         pattern.into(),
            distinctiveness: distinctiveness.clamp(0.0, 1.0),
            clause_type,
            optional:        false
        }
    }

    pub fn optional(pattern: impl Into<String>, distinctiveness: f64, clause_type: ClauseType) -> Self {
        Self {
            optional: true,
            ..Self::required(pattern, distinctiveness, clause_type)
        }
    }
}

/// Directory glob plus priority (1 is searched first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchLocation {
    pub glob:     &'static str,
    pub priority: u8
}

impl SearchLocation {
    pub const fn new(glob: &'static str, priority: u8) -> Self {
        Self {
            glob,
            priority
        }
    }

    /// File extension named by the glob (`app/models/**/*.rb` -> `rb`)
    pub fn extension(&self) -> &'static str {
        self.glob
            .rsplit_once("*.")
            .map(|(_, ext)| ext)
            .unwrap_or("rb")
    }

    /// Directory part before the first wildcard (`app/models/`)
    pub fn directory(&self) -> &'static str {
        match self.glob.find('*') {
            Some(idx) => &self.glob[..idx],
            None => self.glob
        }
    }

    /// Whether a root-relative path falls under this location
    pub fn contains(&self, relative_path: &str) -> bool {
        relative_path.starts_with(self.directory())
            && relative_path.ends_with(&format!(".{}", self.extension()))
    }
}

/// Rule identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    /// Stable identifier (e.g. `LIMIT_OFFSET`)
    pub id:   &'static str,
    pub name: &'static str
}
