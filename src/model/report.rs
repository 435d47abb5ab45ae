//! Derived records: quality scores, analytics, previews and exports

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{Resource, SiteStatus};

/// Scores are percentages in `[0, 100]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub dataset_id: String,
    pub dataset_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_validation: Option<FormatValidation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_compliance: Option<SchemaCompliance>,
    /// Mean of the checks that ran
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completeness {
    pub score: f64,
    pub required_fields: Vec<&'static str>,
    pub missing_fields: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatValidation {
    pub score: f64,
    pub resource_count: usize,
    /// Resources with a known format and a URL
    pub valid_resources: usize,
    pub valid_formats: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaCompliance {
    pub score: f64,
    pub has_license: bool,
    pub has_author: bool,
    pub has_maintainer: bool,
    pub has_temporal_coverage: bool,
    pub has_spatial_coverage: bool,
}

/// Short package listing used in analytics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDataset {
    pub id: String,
    pub name: String,
    pub title: String,
    pub num_resources: usize,
    pub metadata_created: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalAnalytics {
    pub total_datasets: u64,
    pub site_status: SiteStatus,
    /// Newest first
    pub recent_datasets: Vec<RankedDataset>,
    /// Most resources first
    pub popular_datasets: Vec<RankedDataset>,
}

/// Only the requested metrics are filled in
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetAnalytics {
    pub dataset_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_views: Option<u64>,
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub tags_count: usize,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatastorePreview {
    pub total_records: u64,
    pub records: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourcePreview {
    pub resource: Resource,
    /// `None` when the resource is not in the DataStore
    pub datastore: Option<DatastorePreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataExport {
    pub export_format: &'static str,
    pub timestamp: DateTime<Utc>,
    pub datasets: Vec<Value>,
}
