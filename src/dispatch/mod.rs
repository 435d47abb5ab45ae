//! Command dispatch for the tool-invocation surface
//!
//! An external request is a tool name plus a JSON argument bag. The
//! dispatcher maps the name onto exactly one [`CatalogClient`] operation,
//! checks the arguments that operation needs before anything touches the
//! network, and hands back a JSON value or a typed [`ClientError`].

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::client::preview::DEFAULT_PREVIEW_ROWS;
use crate::client::{AnalyticsTarget, CatalogClient, ExportFormat, Metric, QualityCheck, Relation};
use crate::error::{ClientError, ErrorKind, Result};
use crate::query::{
    field_name, parse_timestamp, DateRange, ListQuery, CREATED_FIELD, SearchQuery, ShowQuery, Sort, Spatial,
};

pub mod args;
pub mod server;

pub use args::Args;

/// Prefix agent hosts put in front of tool names
pub const TOOL_PREFIX: &str = "ckan_";

/// Rows a faceted search returns unless told otherwise
pub const FACETED_ROWS: i64 = 100;

/// Related packages returned unless told otherwise
pub const RELATED_RESULTS: i64 = 10;

/// The closed set of tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    PackageList,
    PackageShow,
    PackageSearch,
    FacetedSearch,
    OrganizationList,
    OrganizationShow,
    GroupList,
    GroupShow,
    TagList,
    ResourceShow,
    ResourcePreview,
    SiteRead,
    StatusShow,
    RelatedDatasets,
    DataQualityCheck,
    DatasetAnalytics,
    MetadataExporter,
}

impl Command {
    pub const ALL: [Command; 17] = [
        Command::PackageList,
        Command::PackageShow,
        Command::PackageSearch,
        Command::FacetedSearch,
        Command::OrganizationList,
        Command::OrganizationShow,
        Command::GroupList,
        Command::GroupShow,
        Command::TagList,
        Command::ResourceShow,
        Command::ResourcePreview,
        Command::SiteRead,
        Command::StatusShow,
        Command::RelatedDatasets,
        Command::DataQualityCheck,
        Command::DatasetAnalytics,
        Command::MetadataExporter,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::PackageList => "package_list",
            Command::PackageShow => "package_show",
            Command::PackageSearch => "package_search",
            Command::FacetedSearch => "faceted_search",
            Command::OrganizationList => "organization_list",
            Command::OrganizationShow => "organization_show",
            Command::GroupList => "group_list",
            Command::GroupShow => "group_show",
            Command::TagList => "tag_list",
            Command::ResourceShow => "resource_show",
            Command::ResourcePreview => "resource_preview",
            Command::SiteRead => "site_read",
            Command::StatusShow => "status_show",
            Command::RelatedDatasets => "related_datasets",
            Command::DataQualityCheck => "data_quality_check",
            Command::DatasetAnalytics => "dataset_analytics",
            Command::MetadataExporter => "metadata_exporter",
        }
    }

    /// Name as advertised to agent hosts, e.g. `ckan_package_show`
    pub fn tool_name(&self) -> String {
        format!("{}{}", TOOL_PREFIX, self.name())
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::PackageList => "List package (dataset) names, unsorted; `all` pages through every name",
            Command::PackageShow => "Get the details of one package, including its resources",
            Command::PackageSearch => "Search packages by text, filters and sort order",
            Command::FacetedSearch => "Search with facet counts, field filters, a date range and a geographic area",
            Command::OrganizationList => "List organizations",
            Command::OrganizationShow => "Get one organization, optionally with its datasets",
            Command::GroupList => "List groups",
            Command::GroupShow => "Get one group, optionally with its datasets",
            Command::TagList => "List tags, optionally within a vocabulary",
            Command::ResourceShow => "Get the details of one resource (file)",
            Command::ResourcePreview => "Preview the first rows of a resource held in the DataStore",
            Command::SiteRead => "Check that the site is readable",
            Command::StatusShow => "Get the site status and CKAN version",
            Command::RelatedDatasets => "Find datasets sharing tags, organization or groups with a given dataset",
            Command::DataQualityCheck => "Score a dataset's metadata completeness, resource formats and schema compliance",
            Command::DatasetAnalytics => "View and resource figures for one dataset, or portal-wide activity for `all`",
            Command::MetadataExporter => "Export dataset metadata as DCAT, schema.org or native CKAN JSON",
        }
    }

    /// JSON schema of the tool's arguments
    pub fn input_schema(&self) -> Value {
        let paging = json!({
            "limit": {"type": "integer", "minimum": 0, "description": "Maximum number of entries to return"},
            "offset": {"type": "integer", "minimum": 0, "default": 0, "description": "Offset for pagination"}
        });
        let all_fields = json!({"type": "boolean", "default": false, "description": "Return full objects instead of names"});
        let full_details = json!({"type": "boolean", "default": false, "description": "Include custom extension fields"});
        let include_datasets = json!({"type": "boolean", "default": false, "description": "Include the member datasets"});

        match self {
            Command::PackageList => {
                let mut props = paging;
                props["all"] = json!({"type": "boolean", "default": false, "description": "Page through every package name"});
                props["page_size"] = json!({"type": "integer", "minimum": 1, "default": crate::client::DEFAULT_PAGE_SIZE, "description": "Page size used with `all`"});
                object_schema(props, &[])
            }
            Command::PackageShow => object_schema(
                json!({
                    "id": {"type": "string", "description": "Package ID or name"},
                    "full_details": full_details
                }),
                &["id"],
            ),
            Command::PackageSearch => object_schema(
                json!({
                    "q": {"type": "string", "default": "*:*", "description": "Search query"},
                    "fq": {"type": "string", "description": "Raw filter query"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Match any of these tags"},
                    "organization": {"type": "array", "items": {"type": "string"}, "description": "Match any of these organizations"},
                    "res_format": {"type": "array", "items": {"type": "string"}, "description": "Match any of these resource formats"},
                    "sort": {"type": "string", "description": "Sort field and direction, e.g. 'metadata_modified desc'"},
                    "rows": {"type": "integer", "minimum": 0, "default": 10, "description": "Number of results to return"},
                    "start": {"type": "integer", "minimum": 0, "default": 0, "description": "Offset for pagination"},
                    "facet_fields": {"type": "array", "items": {"type": "string"}, "description": "Fields to count values for"},
                    "created_after": {"type": "string", "description": "Only packages created at or after this ISO-8601 time"},
                    "created_before": {"type": "string", "description": "Only packages created at or before this ISO-8601 time"},
                    "full_details": full_details
                }),
                &[],
            ),
            Command::FacetedSearch => object_schema(
                json!({
                    "q": {"type": "string", "default": "*:*", "description": "Search query"},
                    "facet_fields": {"type": "array", "items": {"type": "string"}, "description": "Fields to facet on; tags, organization and res_format when empty"},
                    "filters": {"type": "object", "additionalProperties": {"type": ["string", "array"]}, "description": "field: value (or list of values) pairs"},
                    "spatial_query": {
                        "type": "object",
                        "description": "Either {\"bbox\": [min_lon, min_lat, max_lon, max_lat]} or {\"point\": [lon, lat], \"radius\": r}",
                        "properties": {
                            "bbox": {"type": "array", "items": {"type": "number"}, "minItems": 4, "maxItems": 4},
                            "point": {"type": "array", "items": {"type": "number"}, "minItems": 2, "maxItems": 2},
                            "radius": {"type": "number", "exclusiveMinimum": 0}
                        }
                    },
                    "date_range": {
                        "type": "object",
                        "description": "ISO-8601 bounds on a date field, either side optional",
                        "properties": {
                            "field": {"type": "string", "default": "metadata_created"},
                            "start": {"type": "string"},
                            "end": {"type": "string"}
                        }
                    },
                    "rows": {"type": "integer", "minimum": 0, "default": FACETED_ROWS, "description": "Number of results to return"},
                    "full_details": full_details
                }),
                &[],
            ),
            Command::OrganizationList | Command::GroupList => {
                let mut props = paging;
                props["all_fields"] = all_fields;
                object_schema(props, &[])
            }
            Command::OrganizationShow => object_schema(
                json!({
                    "id": {"type": "string", "description": "Organization ID or name"},
                    "include_datasets": include_datasets
                }),
                &["id"],
            ),
            Command::GroupShow => object_schema(
                json!({
                    "id": {"type": "string", "description": "Group ID or name"},
                    "include_datasets": include_datasets
                }),
                &["id"],
            ),
            Command::TagList => {
                let mut props = paging;
                props["all_fields"] = all_fields;
                props["vocabulary_id"] = json!({"type": "string", "description": "Vocabulary ID to filter tags"});
                object_schema(props, &[])
            }
            Command::ResourceShow => object_schema(
                json!({"id": {"type": "string", "description": "Resource ID"}}),
                &["id"],
            ),
            Command::ResourcePreview => object_schema(
                json!({
                    "resource_id": {"type": "string", "description": "Resource ID"},
                    "preview_rows": {"type": "integer", "minimum": 0, "default": DEFAULT_PREVIEW_ROWS, "description": "Rows to preview"},
                    "generate_stats": {"type": "boolean", "default": true, "description": "Include the DataStore field descriptions"}
                }),
                &["resource_id"],
            ),
            Command::SiteRead | Command::StatusShow => object_schema(json!({}), &[]),
            Command::RelatedDatasets => object_schema(
                json!({
                    "dataset_id": {"type": "string", "description": "Source dataset ID or name"},
                    "relation_type": {"type": "string", "enum": ["tags", "organization", "theme"], "default": "tags", "description": "What the datasets must share"},
                    "max_results": {"type": "integer", "minimum": 0, "default": RELATED_RESULTS, "description": "Maximum results"}
                }),
                &["dataset_id"],
            ),
            Command::DataQualityCheck => object_schema(
                json!({
                    "dataset_id": {"type": "string", "description": "Dataset to analyze"},
                    "checks": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["completeness", "format_validation", "schema_compliance"]},
                        "description": "Checks to run; all of them when empty"
                    }
                }),
                &["dataset_id"],
            ),
            Command::DatasetAnalytics => object_schema(
                json!({
                    "dataset_id": {"type": "string", "default": "all", "description": "Dataset ID or name, or 'all' for the whole portal"},
                    "metrics": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["views", "recent_views", "resource_count"]},
                        "description": "Figures to report for one dataset; all of them when empty"
                    }
                }),
                &[],
            ),
            Command::MetadataExporter => object_schema(
                json!({
                    "dataset_ids": {"type": "array", "items": {"type": "string"}, "minItems": 1, "description": "Dataset IDs or names to export"},
                    "export_format": {"type": "string", "enum": ["dcat", "schema_org", "ckan_native"], "default": "dcat", "description": "Output vocabulary"},
                    "include_resources": {"type": "boolean", "default": true, "description": "Include resources as distributions"}
                }),
                &["dataset_ids"],
            ),
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.tool_name(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let bare = s.trim();
        let bare = bare.strip_prefix(TOOL_PREFIX).unwrap_or(bare);
        Command::ALL
            .into_iter()
            .find(|c| c.name() == bare)
            .ok_or_else(|| ClientError::UnknownCommand(s.to_string()))
    }
}

/// Tool description as advertised to agents
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Stateless router from tool calls to client operations
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: CatalogClient,
}

impl Dispatcher {
    pub fn new(client: CatalogClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CatalogClient {
        &self.client
    }

    pub fn tools() -> Vec<ToolSpec> {
        Command::ALL.iter().map(Command::spec).collect()
    }

    /// Resolve `name`, validate `arguments` and run the operation
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Value> {
        let command: Command = name.parse()?;
        let args = Args::from_value(arguments)?;
        self.run(command, &args).await
    }

    pub async fn run(&self, command: Command, args: &Args) -> Result<Value> {
        tracing::debug!(%command, "dispatching");
        match command {
            Command::PackageList => {
                if args.flag("all")? {
                    let names = self
                        .client
                        .package_list_all(args.optional_int("page_size")?)
                        .await?;
                    return to_json(&names);
                }
                let query = list_query(args)?;
                to_json(&self.client.package_list(&query).await?)
            }
            Command::PackageShow => {
                let query = ShowQuery::new(args.required_str("id")?)
                    .full_details(args.flag("full_details")?);
                to_json(&self.client.package_show(&query).await?)
            }
            Command::PackageSearch => {
                let query = search_query(args)?;
                to_json(&self.client.package_search(&query).await?)
            }
            Command::FacetedSearch => {
                let query = faceted_query(args)?;
                to_json(&self.client.faceted_search(&query).await?)
            }
            Command::OrganizationList => {
                let query = list_query(args)?.all_fields(args.flag("all_fields")?);
                to_json(&self.client.organization_list(&query).await?)
            }
            Command::OrganizationShow => {
                let query = ShowQuery::new(args.required_str("id")?)
                    .include_datasets(args.flag("include_datasets")?);
                to_json(&self.client.organization_show(&query).await?)
            }
            Command::GroupList => {
                let query = list_query(args)?.all_fields(args.flag("all_fields")?);
                to_json(&self.client.group_list(&query).await?)
            }
            Command::GroupShow => {
                let query = ShowQuery::new(args.required_str("id")?)
                    .include_datasets(args.flag("include_datasets")?);
                to_json(&self.client.group_show(&query).await?)
            }
            Command::TagList => {
                let mut query = list_query(args)?.all_fields(args.flag("all_fields")?);
                query.vocabulary_id = args.optional_str("vocabulary_id")?;
                to_json(&self.client.tag_list(&query).await?)
            }
            Command::ResourceShow => {
                let id = args.required_str("id")?;
                to_json(&self.client.resource_show(&id).await?)
            }
            Command::ResourcePreview => {
                let id = args.required_str("resource_id")?;
                let rows = args
                    .optional_int("preview_rows")?
                    .unwrap_or(DEFAULT_PREVIEW_ROWS);
                let stats = args.flag_or("generate_stats", true)?;
                to_json(&self.client.resource_preview(&id, rows, stats).await?)
            }
            Command::SiteRead => to_json(&self.client.site_read().await?),
            Command::StatusShow => to_json(&self.client.status_show().await?),
            Command::RelatedDatasets => {
                let id = args.required_str("dataset_id")?;
                let relation = match args.optional_str("relation_type")? {
                    Some(r) => r.parse::<Relation>()?,
                    None => Relation::default(),
                };
                let max = args.optional_int("max_results")?.unwrap_or(RELATED_RESULTS);
                to_json(&self.client.related_datasets(&id, relation, max).await?)
            }
            Command::DataQualityCheck => {
                let id = args.required_str("dataset_id")?;
                let checks = parse_all::<QualityCheck>(args.string_list("checks")?)?;
                to_json(&self.client.data_quality_check(&id, &checks).await?)
            }
            Command::DatasetAnalytics => {
                let metrics = parse_all::<Metric>(args.string_list("metrics")?)?;
                let id = args.optional_str("dataset_id")?;
                match AnalyticsTarget::parse(id.as_deref()) {
                    AnalyticsTarget::Portal => to_json(&self.client.portal_analytics().await?),
                    AnalyticsTarget::Dataset(id) => {
                        to_json(&self.client.dataset_analytics(&id, &metrics).await?)
                    }
                }
            }
            Command::MetadataExporter => {
                let ids = args.string_list("dataset_ids")?;
                let format = match args.optional_str("export_format")? {
                    Some(f) => f.parse::<ExportFormat>()?,
                    None => ExportFormat::default(),
                };
                let include_resources = args.flag_or("include_resources", true)?;
                to_json(&self.client.metadata_export(&ids, format, include_resources).await?)
            }
        }
    }

    /// Run a tool call and wrap the outcome for the wire
    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolResponse {
        let started = Instant::now();
        let outcome = self.dispatch(name, arguments).await;
        if let Err(err) = &outcome {
            tracing::warn!(tool = name, kind = %err.kind(), "tool call failed: {}", err);
        }
        ToolResponse::from_outcome(name, outcome, started.elapsed().as_millis() as u64)
    }
}

fn parse_all<T: FromStr<Err = ClientError>>(values: Vec<String>) -> Result<Vec<T>> {
    values.iter().map(|v| v.parse()).collect()
}

fn list_query(args: &Args) -> Result<ListQuery> {
    let query = ListQuery {
        limit: args.optional_int("limit")?,
        offset: args.optional_int("offset")?,
        ..ListQuery::default()
    };
    // surface negative bounds here, before any I/O
    query.checked_limit()?;
    if matches!(query.offset, Some(n) if n < 0) {
        return Err(ClientError::validation("offset", "must be non-negative"));
    }
    Ok(query)
}

fn optional_time(args: &Args, name: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    match args.optional_str(name)? {
        Some(s) if !s.trim().is_empty() => parse_timestamp(name, &s).map(Some),
        _ => Ok(None),
    }
}

fn search_query(args: &Args) -> Result<SearchQuery> {
    let sort = match args.optional_str("sort")? {
        Some(s) if !s.trim().is_empty() => Some(s.parse::<Sort>()?),
        _ => None,
    };
    let query = SearchQuery {
        q: args.optional_str("q")?,
        fq: args.optional_str("fq")?,
        sort,
        rows: args.optional_int("rows")?,
        start: args.optional_int("start")?,
        facet_fields: args.string_list("facet_fields")?,
        full_details: args.flag("full_details")?,
        ..SearchQuery::default()
    }
    .filter("tags", args.string_list("tags")?)
    .filter("organization", args.string_list("organization")?)
    .filter("res_format", args.string_list("res_format")?)
    .created_between(
        optional_time(args, "created_after")?,
        optional_time(args, "created_before")?,
    )?;

    // rows/start are checked by building the request once
    query.to_request()?;
    Ok(query)
}

fn faceted_query(args: &Args) -> Result<SearchQuery> {
    let mut query = SearchQuery {
        q: args.optional_str("q")?,
        rows: Some(args.optional_int("rows")?.unwrap_or(FACETED_ROWS)),
        facet_fields: args.string_list("facet_fields")?,
        full_details: args.flag("full_details")?,
        ..SearchQuery::default()
    };

    if let Some(filters) = args.object("filters")? {
        let fields: Vec<String> = filters.keys().map(str::to_string).collect();
        for field in fields {
            let values = filters.string_list(&field)?;
            query = query.filter(field_name("filters", &field)?, values);
        }
    }

    if let Some(area) = args.object("spatial_query")? {
        let spatial = match (area.floats::<4>("bbox")?, area.floats::<2>("point")?) {
            (Some(bbox), _) => Spatial::bbox(bbox)?,
            (None, Some(point)) => {
                let radius = area
                    .optional_float("radius")?
                    .ok_or_else(|| ClientError::validation("spatial_query.radius", "is required with a point"))?;
                Spatial::around(point, radius)?
            }
            (None, None) => {
                return Err(ClientError::validation(
                    "spatial_query",
                    "expected `bbox` or `point` with `radius`",
                ))
            }
        };
        query = query.spatial(spatial);
    }

    if let Some(range) = args.object("date_range")? {
        let field = range
            .optional_str("field")?
            .unwrap_or_else(|| CREATED_FIELD.to_string());
        let bound = |name: &str| -> Result<_> {
            match range.optional_str(name)? {
                Some(s) if !s.trim().is_empty() && s.trim() != "*" => {
                    parse_timestamp(&format!("date_range.{}", name), &s).map(Some)
                }
                _ => Ok(None),
            }
        };
        let (start, end) = (bound("start")?, bound("end")?);
        if start.is_some() || end.is_some() {
            query = query.date_range(DateRange::new(&field, start, end)?);
        }
    }

    query.to_request()?;
    Ok(query)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ClientError::protocol(format!("failed to encode result: {}", e)))
}

/// Wire form of a tool result
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub tool: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub execution_time_ms: u64,
}

impl ToolResponse {
    pub fn from_outcome(tool: &str, outcome: Result<Value>, execution_time_ms: u64) -> Self {
        let metadata = ResponseMetadata {
            timestamp: chrono::Utc::now(),
            execution_time_ms,
        };
        match outcome {
            Ok(data) => Self {
                id: None,
                success: true,
                data: Some(data),
                error: None,
                metadata,
            },
            Err(err) => Self {
                id: None,
                success: false,
                data: None,
                error: Some(ToolError {
                    kind: err.kind(),
                    message: err.to_string(),
                    tool: tool.to_string(),
                }),
                metadata,
            },
        }
    }

    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }
}
