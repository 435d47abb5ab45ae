//! Operations built from several catalog reads: related datasets, quality
//! scoring and usage analytics

use chrono::Utc;
use std::fmt;
use std::str::FromStr;

use super::CatalogClient;
use crate::error::{ClientError, Result};
use crate::model::{
    Completeness, DatasetAnalytics, FormatValidation, Package, PortalAnalytics, QualityReport,
    RankedDataset, SchemaCompliance,
};
use crate::query::{required_id, Direction, SearchQuery, ShowQuery, Sort};

/// Formats a resource must carry to pass format validation
pub const VALID_FORMATS: &[&str] = &["CSV", "JSON", "XML", "XLS", "XLSX", "PDF", "TXT"];

/// Fields the completeness check looks for
pub const REQUIRED_FIELDS: [&str; 5] = ["title", "notes", "tags", "organization", "resources"];

/// How many entries the portal analytics lists show
const RANKED: usize = 5;

macro_rules! keyword_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ClientError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ClientError::validation(
                        $field,
                        format!(
                            "unknown value `{}`, expected one of: {}",
                            other,
                            [$($text),+].join(", ")
                        ),
                    )),
                }
            }
        }
    };
}

/// What makes another package related
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Relation {
    /// Shares at least one tag
    #[default]
    Tags,
    /// Published by the same organization
    Organization,
    /// Member of one of the same groups
    Theme,
}

keyword_enum!(Relation, "relation_type", {
    Tags => "tags",
    Organization => "organization",
    Theme => "theme",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCheck {
    Completeness,
    FormatValidation,
    SchemaCompliance,
}

impl QualityCheck {
    pub const ALL: [QualityCheck; 3] = [
        QualityCheck::Completeness,
        QualityCheck::FormatValidation,
        QualityCheck::SchemaCompliance,
    ];
}

keyword_enum!(QualityCheck, "checks", {
    Completeness => "completeness",
    FormatValidation => "format_validation",
    SchemaCompliance => "schema_compliance",
});

/// Per-dataset analytics figures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// All-time views from the tracking summary
    Views,
    /// Views over the server's recent window (14 days by default)
    RecentViews,
    ResourceCount,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Views, Metric::RecentViews, Metric::ResourceCount];
}

keyword_enum!(Metric, "metrics", {
    Views => "views",
    RecentViews => "recent_views",
    ResourceCount => "resource_count",
});

/// Whole portal or one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsTarget {
    Portal,
    Dataset(String),
}

impl AnalyticsTarget {
    /// `all` (or nothing) means the whole portal
    pub fn parse(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            None | Some("") | Some("all") => AnalyticsTarget::Portal,
            Some(id) => AnalyticsTarget::Dataset(id.to_string()),
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn completeness(pkg: &Package) -> Completeness {
    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| match *field {
            "title" => pkg.title.trim().is_empty(),
            "notes" => pkg.notes.trim().is_empty(),
            "tags" => pkg.tags.is_empty(),
            "organization" => pkg.organization.is_none(),
            _ => pkg.resources.is_empty(),
        })
        .collect();
    Completeness {
        score: percent(REQUIRED_FIELDS.len() - missing.len(), REQUIRED_FIELDS.len()),
        required_fields: REQUIRED_FIELDS.to_vec(),
        missing_fields: missing,
    }
}

fn format_validation(pkg: &Package) -> FormatValidation {
    let valid = pkg
        .resources
        .iter()
        .filter(|r| {
            let format = r.format.trim().to_ascii_uppercase();
            VALID_FORMATS.contains(&format.as_str()) && !r.url.trim().is_empty()
        })
        .count();
    FormatValidation {
        score: percent(valid, pkg.resources.len()),
        resource_count: pkg.resources.len(),
        valid_resources: valid,
        valid_formats: VALID_FORMATS,
    }
}

fn schema_compliance(pkg: &Package) -> SchemaCompliance {
    let filled = |s: &str| !s.trim().is_empty();
    let has_license = filled(&pkg.license);
    let has_author = filled(&pkg.author) || filled(&pkg.author_email);
    let has_maintainer = filled(&pkg.maintainer) || filled(&pkg.maintainer_email);
    let has_temporal_coverage = pkg.extra("temporal_coverage_from").is_some()
        || pkg.extra("temporal_coverage_to").is_some();
    let has_spatial_coverage = pkg.extra("spatial").is_some();

    let met = [
        has_license,
        has_author,
        has_maintainer,
        has_temporal_coverage,
        has_spatial_coverage,
    ]
    .iter()
    .filter(|b| **b)
    .count();
    SchemaCompliance {
        score: percent(met, 5),
        has_license,
        has_author,
        has_maintainer,
        has_temporal_coverage,
        has_spatial_coverage,
    }
}

/// Score `pkg` on `checks`; the overall score is their mean
pub fn assess(pkg: &Package, checks: &[QualityCheck]) -> QualityReport {
    let mut report = QualityReport {
        dataset_id: pkg.id.clone(),
        dataset_name: pkg.name.clone(),
        timestamp: Utc::now(),
        completeness: None,
        format_validation: None,
        schema_compliance: None,
        overall_score: 0.0,
    };
    let mut scores = Vec::new();
    for (i, check) in checks.iter().enumerate() {
        if checks[..i].contains(check) {
            continue;
        }
        match check {
            QualityCheck::Completeness => {
                let c = completeness(pkg);
                scores.push(c.score);
                report.completeness = Some(c);
            }
            QualityCheck::FormatValidation => {
                let f = format_validation(pkg);
                scores.push(f.score);
                report.format_validation = Some(f);
            }
            QualityCheck::SchemaCompliance => {
                let s = schema_compliance(pkg);
                scores.push(s.score);
                report.schema_compliance = Some(s);
            }
        }
    }
    if !scores.is_empty() {
        report.overall_score = scores.iter().sum::<f64>() / scores.len() as f64;
    }
    report
}

fn ranked(pkg: &Package) -> RankedDataset {
    RankedDataset {
        id: pkg.id.clone(),
        name: pkg.name.clone(),
        title: pkg.title.clone(),
        num_resources: pkg.num_resources,
        metadata_created: pkg.metadata_created,
    }
}

impl CatalogClient {
    /// Packages sharing tags, organization or groups with `id`, never `id`
    /// itself, at most `max_results` of them
    pub async fn related_datasets(
        &self,
        id: &str,
        relation: Relation,
        max_results: i64,
    ) -> Result<Vec<Package>> {
        required_id("dataset_id", id)?;
        if max_results < 0 {
            return Err(ClientError::validation(
                "max_results",
                format!("must be non-negative, got {}", max_results),
            ));
        }

        let source = self.package_show(&ShowQuery::new(id)).await?;
        let search = match relation {
            Relation::Tags => SearchQuery::new().filter("tags", source.tag_names()),
            Relation::Organization => match &source.organization {
                Some(org) if !org.name.is_empty() => {
                    SearchQuery::new().filter("organization", [org.name.as_str()])
                }
                Some(org) if !org.id.is_empty() => {
                    SearchQuery::new().filter("owner_org", [org.id.as_str()])
                }
                _ => SearchQuery::new(),
            },
            Relation::Theme => SearchQuery::new().filter(
                "groups",
                source
                    .groups
                    .iter()
                    .map(|g| if g.name.is_empty() { g.id.clone() } else { g.name.clone() }),
            ),
        };
        if search.filters.is_empty() || max_results == 0 {
            tracing::debug!(%id, %relation, "nothing to relate on");
            return Ok(Vec::new());
        }

        // one extra row covers the source package turning up in its own results
        let found = self.package_search(&search.rows(max_results + 1)).await?;
        let is_source = |p: &Package| {
            p.id == id
                || p.name == id
                || (!source.id.is_empty() && p.id == source.id)
                || (!source.name.is_empty() && p.name == source.name)
        };
        Ok(found
            .results
            .into_iter()
            .filter(|p| !is_source(p))
            .take(max_results as usize)
            .collect())
    }

    /// Completeness, format and metadata-schema scores for one package
    pub async fn data_quality_check(
        &self,
        id: &str,
        checks: &[QualityCheck],
    ) -> Result<QualityReport> {
        let checks = if checks.is_empty() {
            &QualityCheck::ALL[..]
        } else {
            checks
        };
        // temporal and spatial coverage live in the extension fields
        let pkg = self
            .package_show(&ShowQuery::new(id).full_details(true))
            .await?;
        Ok(assess(&pkg, checks))
    }

    pub async fn portal_analytics(&self) -> Result<PortalAnalytics> {
        let newest = SearchQuery::new()
            .sort(Sort::new("metadata_created", Direction::Desc))
            .rows(RANKED as i64);
        let largest = SearchQuery::new()
            .sort(Sort::new("num_resources", Direction::Desc))
            .rows(RANKED as i64);
        let (status, recent, popular) = tokio::try_join!(
            self.status_show(),
            self.package_search(&newest),
            self.package_search(&largest),
        )?;
        Ok(PortalAnalytics {
            total_datasets: recent.count,
            site_status: status,
            recent_datasets: recent.results.iter().map(ranked).collect(),
            popular_datasets: popular.results.iter().map(ranked).collect(),
        })
    }

    /// Figures for one package; `metrics` empty means all of them
    pub async fn dataset_analytics(&self, id: &str, metrics: &[Metric]) -> Result<DatasetAnalytics> {
        let metrics = if metrics.is_empty() {
            &Metric::ALL[..]
        } else {
            metrics
        };
        let wants_views = metrics
            .iter()
            .any(|m| matches!(m, Metric::Views | Metric::RecentViews));
        let pkg = self
            .package_show(&ShowQuery::new(id).full_details(wants_views))
            .await?;
        let tracking = pkg.tracking.unwrap_or_default();

        let mut analytics = DatasetAnalytics {
            dataset_id: pkg.id.clone(),
            name: pkg.name.clone(),
            created: pkg.metadata_created,
            modified: pkg.metadata_modified,
            tags_count: pkg.tags.len(),
            organization: pkg.organization.as_ref().map(|o| o.display_name().to_string()),
            ..DatasetAnalytics::default()
        };
        for metric in metrics {
            match metric {
                Metric::Views => analytics.views = Some(tracking.total),
                Metric::RecentViews => analytics.recent_views = Some(tracking.recent),
                Metric::ResourceCount => analytics.resource_count = Some(pkg.resources.len()),
            }
        }
        Ok(analytics)
    }
}
