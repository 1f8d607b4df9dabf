//! Core data models for the cloud sweeper
//!
//! Every resource kind is a variant of the closed [`CloudItem`] enum, so the
//! filter engine can dispatch on kind with compile-time exhaustiveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Owner reported for items that carry no ownership information
pub const UNKNOWN_OWNER: &str = "???";

/// Tag the ownerless filter looks for by default
pub const DEFAULT_OWNER_LABEL: &str = "Owner";

/// Tag keys consulted, in order, when deriving an owner from tags
const OWNER_TAG_KEYS: [&str; 2] = ["Owner", "owner"];

/// Key-value tags attached to a cloud item
pub type Tags = BTreeMap<String, String>;

/// Cloud provider hosting an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Gcp];
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Aws => write!(f, "AWS"),
            Provider::Azure => write!(f, "AZURE"),
            Provider::Gcp => write!(f, "GCP"),
        }
    }
}

/// Lifecycle state shared by the stateful kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Running,
    Stopped,
    Terminated,
    #[default]
    Unknown,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Running => write!(f, "running"),
            State::Stopped => write!(f, "stopped"),
            State::Terminated => write!(f, "terminated"),
            State::Unknown => write!(f, "unknown"),
        }
    }
}

/// Discriminant of [`CloudItem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Instance,
    Cluster,
    Stack,
    Database,
    Disk,
    Access,
    Alert,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Stack => "stack",
            ResourceKind::Database => "database",
            ResourceKind::Disk => "disk",
            ResourceKind::Access => "access",
            ResourceKind::Alert => "alert",
        };
        f.write_str(name)
    }
}

/// Virtual machine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub provider: Provider,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub state: State,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Managed Hadoop/Kubernetes style cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub provider: Provider,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub state: State,
}

/// Infrastructure-as-code stack (CloudFormation, ARM deployment, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub provider: Provider,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub state: State,
}

/// Managed database instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub provider: Provider,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub state: State,
}

/// Block storage volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub provider: Provider,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub size_gb: u64,
    #[serde(default)]
    pub disk_type: String,
    #[serde(default)]
    pub state: State,
}

/// Access credential (API key, service account key)
///
/// Credentials carry no tags; the owner is reported by the provider directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Access {
    pub name: String,
    pub created: DateTime<Utc>,
    pub provider: Provider,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Monitoring alert definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub provider: Provider,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub state: State,
}

/// A unit of cloud infrastructure processed by filters and actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CloudItem {
    Instance(Instance),
    Cluster(Cluster),
    Stack(Stack),
    Database(Database),
    Disk(Disk),
    Access(Access),
    Alert(Alert),
}

/// Empty tag set handed out for kinds without tags
static NO_TAGS: Tags = Tags::new();

impl CloudItem {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CloudItem::Instance(_) => ResourceKind::Instance,
            CloudItem::Cluster(_) => ResourceKind::Cluster,
            CloudItem::Stack(_) => ResourceKind::Stack,
            CloudItem::Database(_) => ResourceKind::Database,
            CloudItem::Disk(_) => ResourceKind::Disk,
            CloudItem::Access(_) => ResourceKind::Access,
            CloudItem::Alert(_) => ResourceKind::Alert,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CloudItem::Instance(i) => &i.name,
            CloudItem::Cluster(c) => &c.name,
            CloudItem::Stack(s) => &s.name,
            CloudItem::Database(d) => &d.name,
            CloudItem::Disk(d) => &d.name,
            CloudItem::Access(a) => &a.name,
            CloudItem::Alert(a) => &a.name,
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            CloudItem::Instance(i) => i.provider,
            CloudItem::Cluster(c) => c.provider,
            CloudItem::Stack(s) => s.provider,
            CloudItem::Database(d) => d.provider,
            CloudItem::Disk(d) => d.provider,
            CloudItem::Access(a) => a.provider,
            CloudItem::Alert(a) => a.provider,
        }
    }

    pub fn created(&self) -> DateTime<Utc> {
        match self {
            CloudItem::Instance(i) => i.created,
            CloudItem::Cluster(c) => c.created,
            CloudItem::Stack(s) => s.created,
            CloudItem::Database(d) => d.created,
            CloudItem::Disk(d) => d.created,
            CloudItem::Access(a) => a.created,
            CloudItem::Alert(a) => a.created,
        }
    }

    /// Tags of the item; an empty map for kinds without tags
    pub fn tags(&self) -> &Tags {
        match self {
            CloudItem::Instance(i) => &i.tags,
            CloudItem::Cluster(c) => &c.tags,
            CloudItem::Stack(s) => &s.tags,
            CloudItem::Database(d) => &d.tags,
            CloudItem::Disk(d) => &d.tags,
            CloudItem::Access(_) => &NO_TAGS,
            CloudItem::Alert(a) => &a.tags,
        }
    }

    /// Owner of the item, or [`UNKNOWN_OWNER`] when none is recorded
    pub fn owner(&self) -> &str {
        let owner = match self {
            CloudItem::Access(a) => a.owner.as_deref(),
            _ => owner_from_tags(self.tags()),
        };
        match owner {
            Some(o) if !o.is_empty() => o,
            _ => UNKNOWN_OWNER,
        }
    }

    /// Identifier of the item; credentials are identified by name
    pub fn id(&self) -> &str {
        match self {
            CloudItem::Instance(i) => &i.id,
            CloudItem::Cluster(c) => &c.id,
            CloudItem::Stack(s) => &s.id,
            CloudItem::Database(d) => &d.id,
            CloudItem::Disk(d) => &d.id,
            CloudItem::Access(a) => &a.name,
            CloudItem::Alert(a) => &a.id,
        }
    }

    pub fn state(&self) -> State {
        match self {
            CloudItem::Instance(i) => i.state,
            CloudItem::Cluster(c) => c.state,
            CloudItem::Stack(s) => s.state,
            CloudItem::Database(d) => d.state,
            CloudItem::Disk(d) => d.state,
            CloudItem::Access(_) => State::Unknown,
            CloudItem::Alert(a) => a.state,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            CloudItem::Instance(i) => Some(i),
            _ => None,
        }
    }
}

impl fmt::Display for CloudItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.provider(), self.kind(), self.name())
    }
}

/// Look up the owner tag (`Owner`, then `owner`)
pub fn owner_from_tags(tags: &Tags) -> Option<&str> {
    OWNER_TAG_KEYS
        .iter()
        .find_map(|key| tags.get(*key).map(String::as_str))
}
