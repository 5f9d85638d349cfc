//! Work item priority tag

use serde::{Deserialize, Serialize};

/// Priority tag attached to a work item
///
/// Sources use free-form strings; the three well-known levels get their own
/// variants and anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    #[default]
    Unset,
    Other(String),
}

impl Priority {
    /// Parse a source priority string; blank means unset
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "" => Self::Unset,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    /// Colored marker shown in the task list
    pub fn icon(&self) -> &'static str {
        match self {
            Self::High => "🔴",
            Self::Medium => "🟡",
            Self::Low => "🟢",
            Self::Unset | Self::Other(_) => "  ",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Unset => write!(f, ""),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}
