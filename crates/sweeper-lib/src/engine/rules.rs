//! Declarative include/exclude rule table
//!
//! Rules are stored in a typed table keyed by
//! `(direction, section, provider, property)`. A key that is absent means the
//! criterion is not configured for that combination, which is different from
//! a configured but empty list.

use crate::error::ConfigError;
use crate::models::{Provider, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Whether a filter's rules describe what to keep or what to remove
///
/// Inclusive filters read the include partition of the rule table, exclusive
/// filters the exclude partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inclusive,
    Exclusive,
}

impl Direction {
    pub fn is_inclusive(self) -> bool {
        matches!(self, Direction::Inclusive)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inclusive => write!(f, "include"),
            Direction::Exclusive => write!(f, "exclude"),
        }
    }
}

/// Configuration shape a resource kind is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSection {
    /// Names and owners only
    Access,
    /// Names, owners and labels; shared by every non-access kind
    Instance,
}

impl RuleSection {
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Access => RuleSection::Access,
            ResourceKind::Instance
            | ResourceKind::Cluster
            | ResourceKind::Stack
            | ResourceKind::Database
            | ResourceKind::Disk
            | ResourceKind::Alert => RuleSection::Instance,
        }
    }

    pub fn supports(self, property: Property) -> bool {
        match self {
            RuleSection::Access => !matches!(property, Property::Label),
            RuleSection::Instance => true,
        }
    }
}

impl fmt::Display for RuleSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSection::Access => write!(f, "access"),
            RuleSection::Instance => write!(f, "instance"),
        }
    }
}

/// Criterion a rule list applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    Name,
    Owner,
    Label,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Name => write!(f, "names"),
            Property::Owner => write!(f, "owners"),
            Property::Label => write!(f, "labels"),
        }
    }
}

/// Key of one rule list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RuleKey {
    pub direction: Direction,
    pub section: RuleSection,
    pub provider: Provider,
    pub property: Property,
}

/// Resolved include/exclude rule table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
    rules: BTreeMap<RuleKey, Vec<String>>,
}

impl FilterConfig {
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::default()
    }

    /// Look up the configured values for a combination
    ///
    /// Returns `None` when the combination is not configured, including
    /// properties the kind's section does not support.
    pub fn resolve(
        &self,
        direction: Direction,
        kind: ResourceKind,
        provider: Provider,
        property: Property,
    ) -> Option<&[String]> {
        let section = RuleSection::for_kind(kind);
        if !section.supports(property) {
            return None;
        }
        let key = RuleKey {
            direction,
            section,
            provider,
            property,
        };
        let values = self.rules.get(&key).map(Vec::as_slice);
        debug!(
            %direction, %section, %provider, %property,
            configured = values.is_some(),
            "Resolved filter rule"
        );
        values
    }

    /// Iterate over every configured rule list
    pub fn entries(&self) -> impl Iterator<Item = (&RuleKey, &[String])> {
        self.rules.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn insert(&mut self, key: RuleKey, values: Vec<String>) -> Result<(), ConfigError> {
        if !key.section.supports(key.property) {
            return Err(ConfigError::InvalidSetting {
                name: format!("{}{}.{}", key.direction, key.section, key.property),
                reason: format!("{} rules do not support {}", key.section, key.property),
            });
        }
        self.rules.insert(key, values);
        Ok(())
    }

    /// Load a filter document (YAML, JSON or TOML, by extension)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| ConfigError::Document(format!("{}: {}", path.display(), e)))?;
        let document: FilterDocument = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Document(format!("{}: {}", path.display(), e)))?;
        Self::from_document(document)
    }

    /// Parse a filter document held in memory
    pub fn parse(content: &str, format: config::FileFormat) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, format))
            .build()
            .map_err(|e| ConfigError::Document(e.to_string()))?;
        let document: FilterDocument = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Document(e.to_string()))?;
        Self::from_document(document)
    }

    pub fn from_document(document: FilterDocument) -> Result<Self, ConfigError> {
        let mut config = FilterConfig::default();
        let sections = [
            (Direction::Inclusive, document.include_access.map(ProviderBlocks::into_criteria)),
            (Direction::Exclusive, document.exclude_access.map(ProviderBlocks::into_criteria)),
        ];
        for (direction, blocks) in sections {
            config.insert_blocks(direction, RuleSection::Access, blocks)?;
        }
        let sections = [
            (Direction::Inclusive, document.include_instance.map(ProviderBlocks::into_criteria)),
            (Direction::Exclusive, document.exclude_instance.map(ProviderBlocks::into_criteria)),
        ];
        for (direction, blocks) in sections {
            config.insert_blocks(direction, RuleSection::Instance, blocks)?;
        }
        Ok(config)
    }

    fn insert_blocks(
        &mut self,
        direction: Direction,
        section: RuleSection,
        blocks: Option<Vec<(Provider, Criteria)>>,
    ) -> Result<(), ConfigError> {
        for (provider, criteria) in blocks.into_iter().flatten() {
            let lists = [
                (Property::Name, criteria.names),
                (Property::Owner, criteria.owners),
                (Property::Label, criteria.labels),
            ];
            for (property, values) in lists {
                if let Some(values) = values {
                    let key = RuleKey {
                        direction,
                        section,
                        provider,
                        property,
                    };
                    self.insert(key, values)?;
                }
            }
        }
        Ok(())
    }
}

/// Programmatic construction of a [`FilterConfig`]
#[derive(Debug, Default)]
pub struct FilterConfigBuilder {
    entries: Vec<(RuleKey, Vec<String>)>,
}

impl FilterConfigBuilder {
    pub fn rule<I, S>(
        mut self,
        direction: Direction,
        section: RuleSection,
        provider: Provider,
        property: Property,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = RuleKey {
            direction,
            section,
            provider,
            property,
        };
        self.entries
            .push((key, values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn build(self) -> Result<FilterConfig, ConfigError> {
        let mut config = FilterConfig::default();
        for (key, values) in self.entries {
            config.insert(key, values)?;
        }
        Ok(config)
    }
}

/// On-disk layout of the filter document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterDocument {
    #[serde(default, rename = "includeAccess", alias = "includeaccess")]
    pub include_access: Option<ProviderBlocks<AccessBlock>>,
    #[serde(default, rename = "excludeAccess", alias = "excludeaccess")]
    pub exclude_access: Option<ProviderBlocks<AccessBlock>>,
    #[serde(default, rename = "includeInstance", alias = "includeinstance")]
    pub include_instance: Option<ProviderBlocks<InstanceBlock>>,
    #[serde(default, rename = "excludeInstance", alias = "excludeinstance")]
    pub exclude_instance: Option<ProviderBlocks<InstanceBlock>>,
}

/// Per-provider blocks of one document section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderBlocks<T> {
    #[serde(default)]
    pub aws: Option<T>,
    #[serde(default)]
    pub azure: Option<T>,
    #[serde(default)]
    pub gcp: Option<T>,
}

impl<T: Into<Criteria>> ProviderBlocks<T> {
    fn into_criteria(self) -> Vec<(Provider, Criteria)> {
        [
            (Provider::Aws, self.aws),
            (Provider::Azure, self.azure),
            (Provider::Gcp, self.gcp),
        ]
        .into_iter()
        .filter_map(|(provider, block)| block.map(|b| (provider, b.into())))
        .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessBlock {
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub owners: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceBlock {
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub owners: Option<Vec<String>>,
}

/// Shape-independent view of a provider block
#[derive(Debug, Default)]
struct Criteria {
    names: Option<Vec<String>>,
    owners: Option<Vec<String>>,
    labels: Option<Vec<String>>,
}

impl From<AccessBlock> for Criteria {
    fn from(block: AccessBlock) -> Self {
        Criteria {
            names: block.names,
            owners: block.owners,
            labels: None,
        }
    }
}

impl From<InstanceBlock> for Criteria {
    fn from(block: InstanceBlock) -> Self {
        Criteria {
            names: block.names,
            owners: block.owners,
            labels: block.labels,
        }
    }
}
