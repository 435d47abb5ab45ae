//! Normalized catalog records
//!
//! The catalog's JSON is loosely typed and deployments disagree on which
//! fields exist, so every record here is built defensively by
//! [`normalize`]: missing text becomes an empty string, missing lists become
//! empty, numbers that cannot be read become `None`.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub mod normalize;
pub mod report;

pub use report::{
    Completeness, DatasetAnalytics, DatastorePreview, FieldInfo, FormatValidation,
    MetadataExport, PortalAnalytics, QualityReport, RankedDataset, ResourcePreview,
    SchemaCompliance,
};

/// Whether extension fields survive normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Detail {
    #[default]
    Summary,
    Full,
}

impl Detail {
    pub fn from_flag(full: bool) -> Self {
        if full {
            Detail::Full
        } else {
            Detail::Summary
        }
    }
}

/// Lightweight pointer to an organization or group embedded in a package
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
    pub title: String,
}

impl EntityRef {
    pub fn display_name(&self) -> &str {
        first_non_empty(&[&self.title, &self.name, &self.id])
    }
}

/// A dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub title: String,
    pub notes: String,
    pub organization: Option<EntityRef>,
    /// Groups (themes) the package belongs to
    pub groups: Vec<EntityRef>,
    pub author: String,
    pub author_email: String,
    pub maintainer: String,
    pub maintainer_email: String,
    pub license: String,
    pub state: String,
    pub metadata_created: Option<NaiveDateTime>,
    pub metadata_modified: Option<NaiveDateTime>,
    pub tags: Vec<Tag>,
    pub resources: Vec<Resource>,
    /// Reported resource count; falls back to `resources.len()`
    pub num_resources: usize,
    /// View counts, present when the server tracks them and full detail was asked for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Tracking>,
    /// Custom fields, only kept with [`Detail::Full`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<BTreeMap<String, Value>>,
}

impl Package {
    pub fn display_name(&self) -> &str {
        first_non_empty(&[&self.title, &self.name, &self.id])
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    /// Non-empty extension field
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras
            .as_ref()?
            .get(key)
            .filter(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty()))
    }
}

/// `tracking_summary` of a package
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tracking {
    pub total: u64,
    pub recent: u64,
}

/// A downloadable file attached to a package
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resource {
    pub id: String,
    pub package_id: String,
    pub name: String,
    pub format: String,
    pub url: String,
    pub description: String,
    /// Bytes, `None` when unknown
    pub size: Option<u64>,
    pub created: Option<NaiveDateTime>,
    pub last_modified: Option<NaiveDateTime>,
}

impl Resource {
    pub fn display_name(&self) -> &str {
        first_non_empty(&[&self.name, &self.url, &self.id])
    }
}

/// Organization or group; CKAN models both the same way
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub is_organization: bool,
    pub created: Option<NaiveDateTime>,
    pub package_count: Option<u64>,
    /// Member packages, only present when `include_datasets` was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<Package>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<BTreeMap<String, Value>>,
}

pub type Organization = Group;

impl Group {
    pub fn display_name(&self) -> &str {
        first_non_empty(&[&self.title, &self.name, &self.id])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary_id: Option<String>,
}

/// One page of `package_search`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    /// Total matches on the server, at least `results.len()`
    pub count: u64,
    pub results: Vec<Package>,
    /// Facet field → (value → count), empty unless facets were requested
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteStatus {
    pub ckan_version: String,
    pub site_title: String,
    pub site_description: String,
    pub site_url: String,
    pub locale_default: String,
    pub extensions: Vec<String>,
}

/// Aggregate counts shown by `ckan stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortalStats {
    pub total_packages: u64,
    pub total_organizations: u64,
    pub total_tags: u64,
    pub ckan_version: String,
}

fn first_non_empty<'a>(candidates: &[&'a String]) -> &'a str {
    candidates
        .iter()
        .find(|s| !s.is_empty())
        .map(|s| s.as_str())
        .unwrap_or("Unknown")
}
