

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};
use tracing::{info, warn};

use super::taxonomy::TaxonomyCode;
use crate::core::error::{AdvisorError, Result};

/// The reporting groups with sector-specific standards on top of the agnostic set.
/// Adding one means adding a corpus folder here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpecialGroup {
    OilAndGas,
    Mining,
    RoadTransport,
}

impl SpecialGroup {
    pub fn corpus_folder(self) -> &'static str {
        match self {
            Self::OilAndGas => "oil_gas_db",
            Self::Mining => "mining_db",
            Self::RoadTransport => "road_db",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::OilAndGas => "Oil & Gas",
            Self::Mining => "Mining, Quarrying and Coal",
            Self::RoadTransport => "Road Transport",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::OilAndGas => &[
                "oil & gas",
                "oil & gas company",
                "oil & gas standards",
                "oil_gas",
                "oil_and_gas",
            ],
            Self::Mining => &[
                "mining, quarrying and coal",
                "mining, quarrying and coal standards",
                "mining",
            ],
            Self::RoadTransport => &[
                "road transport",
                "road transport standards",
                "road_transport",
                "road",
            ],
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let needle = label.trim().to_lowercase();
        Self::iter().find(|group| group.aliases().contains(&needle.as_str()))
    }

    pub fn short_name(self) -> &'static str {
        self.into()
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ReportingGroup {
    #[default]
    Agnostic,
    Special(SpecialGroup),
    /// A label from the lookup table with no dedicated corpus.
    Other(String),
}

impl ReportingGroup {
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("agnostic") {
            return Self::Agnostic;
        }
        match SpecialGroup::from_label(trimmed) {
            Some(group) => Self::Special(group),
            None => Self::Other(trimmed.to_string()),
        }
    }

    pub fn special(&self) -> Option<SpecialGroup> {
        match self {
            Self::Special(group) => Some(*group),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Agnostic => "Agnostic",
            Self::Special(group) => group.display_name(),
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for ReportingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<ReportingGroup> for String {
    fn from(group: ReportingGroup) -> Self {
        group.label().to_string()
    }
}

impl From<String> for ReportingGroup {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

/// Static TaxonomyCode → ReportingGroup table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ReportingGroupTable {
    entries: HashMap<String, ReportingGroup>,
}

impl ReportingGroupTable {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = HashMap::new();
        for (code, label) in pairs {
            match TaxonomyCode::parse(code.as_ref()) {
                Some(TaxonomyCode::Code(code)) => {
                    entries.insert(code, ReportingGroup::from_label(label.as_ref()));
                }
                _ => warn!("Skipping sector table key that is not a taxonomy code: {}", code.as_ref()),
            }
        }
        Self { entries }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let pairs: HashMap<String, String> = serde_json::from_str(raw)
            .map_err(|e| AdvisorError::SectorTable(format!("invalid sector table: {e}")))?;
        Ok(Self::from_pairs(pairs))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AdvisorError::SectorTable(format!("cannot read {}: {e}", path.display()))
        })?;
        let table = Self::from_json_str(&raw)?;

        let special = table.entries.values().filter(|g| g.special().is_some()).count();
        info!(
            "Loaded sector table from {}: {} codes, {} with special standards",
            path.display(),
            table.len(),
            special
        );
        Ok(table)
    }

    pub fn group_for(&self, code: &TaxonomyCode) -> ReportingGroup {
        match code {
            TaxonomyCode::Agnostic => ReportingGroup::Agnostic,
            TaxonomyCode::Code(code) => self.entries.get(code).cloned().unwrap_or_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
