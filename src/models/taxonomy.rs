//! Closed vocabularies used to route and rank knowledge chunks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Topical owner of a chunk.
///
/// `Universal` marks cross-cutting knowledge: it is the fallback when no
/// topical signal is found and it stays eligible under any companion filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Companion {
    SuperSal,
    Athena,
    EbyTech,
    PartnerTech,
    SvtLegal,
    #[default]
    Universal,
}

impl Companion {
    pub const ALL: [Companion; 6] = [
        Companion::SuperSal,
        Companion::Athena,
        Companion::EbyTech,
        Companion::PartnerTech,
        Companion::SvtLegal,
        Companion::Universal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Companion::SuperSal => "supersal",
            Companion::Athena => "athena",
            Companion::EbyTech => "ebytech",
            Companion::PartnerTech => "partnertech",
            Companion::SvtLegal => "svtlegal",
            Companion::Universal => "universal",
        }
    }

    /// Whether a chunk owned by `self` may be returned under `filter`.
    pub fn is_eligible_for(&self, filter: Option<Companion>) -> bool {
        match filter {
            None => true,
            Some(wanted) => *self == wanted || *self == Companion::Universal,
        }
    }
}

impl fmt::Display for Companion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Companion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ValidationError::unsupported("companion", s))
    }
}

/// Content category of a chunk. Defaults to `Sales`, the business fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sop,
    Training,
    Marketing,
    Technical,
    Legal,
    #[default]
    Sales,
    Hacp,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Sop,
        Category::Training,
        Category::Marketing,
        Category::Technical,
        Category::Legal,
        Category::Sales,
        Category::Hacp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sop => "sop",
            Category::Training => "training",
            Category::Marketing => "marketing",
            Category::Technical => "technical",
            Category::Legal => "legal",
            Category::Sales => "sales",
            Category::Hacp => "hacp",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ValidationError::unsupported("category", s))
    }
}

/// Retrieval priority of a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    #[default]
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| ValidationError::unsupported("priority", s))
    }
}
