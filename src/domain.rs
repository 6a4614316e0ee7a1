use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GdcError;

/// Distinct case identifiers making up a cohort.
pub type CaseIdSet = HashSet<String>;

/// Anatomical primary site as named by the portal, e.g. `Breast` or `Bronchus and lung`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimarySite(String);

impl PrimarySite {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name used for this site's outputs. Slashes are not path-safe.
    pub fn dir_name(&self) -> String {
        format!("{} Cancer", self.0.replace('/', "-"))
    }
}

impl fmt::Display for PrimarySite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrimarySite {
    type Err = GdcError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(|ch| ch.is_control()) {
            return Err(GdcError::InvalidSite(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneSymbol(String);

impl GeneSymbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9][A-Z0-9._@-]*$").unwrap())
}

impl FromStr for GeneSymbol {
    type Err = GdcError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !symbol_pattern().is_match(&normalized) {
            return Err(GdcError::InvalidGeneSymbol(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Stable portal gene identifier (Ensembl gene id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneId(String);

impl GeneId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A gene that discovery produced but that has not been counted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneCandidate {
    pub id: GeneId,
    pub symbol: GeneSymbol,
    pub is_census: bool,
}

/// A gene with its number of distinct affected cohort cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedGene {
    pub id: GeneId,
    pub symbol: GeneSymbol,
    pub cohort_affected_cases: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Start from the curated cancer gene census list.
    Census,
    /// Aggregate mutated gene symbols for the site, keep census members.
    #[default]
    Aggregation,
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStrategy::Census => write!(f, "census"),
            DiscoveryStrategy::Aggregation => write!(f, "aggregation"),
        }
    }
}
