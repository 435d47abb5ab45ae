//! Request construction for the CKAN action API
//!
//! Every call to the catalog is described by a [`CatalogRequest`]: one of the
//! supported [`Action`]s plus a deterministic set of parameters. The builders
//! in this module validate caller input locally so bad arguments never cost a
//! round trip.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ClientError, Result};

pub mod filter;
pub mod spatial;

pub use filter::{field_name, parse_timestamp, DateRange, Direction, FilterQuery, Sort};
pub use spatial::Spatial;

/// Query that matches every package
pub const MATCH_ALL: &str = "*:*";

/// Date field behind `created_after` / `created_before`
pub const CREATED_FIELD: &str = "metadata_created";

/// Read-only actions the client knows how to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    PackageList,
    PackageShow,
    PackageSearch,
    OrganizationList,
    OrganizationShow,
    GroupList,
    GroupShow,
    TagList,
    ResourceShow,
    DatastoreSearch,
    SiteRead,
    StatusShow,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::PackageList => "package_list",
            Action::PackageShow => "package_show",
            Action::PackageSearch => "package_search",
            Action::OrganizationList => "organization_list",
            Action::OrganizationShow => "organization_show",
            Action::GroupList => "group_list",
            Action::GroupShow => "group_show",
            Action::TagList => "tag_list",
            Action::ResourceShow => "resource_show",
            Action::DatastoreSearch => "datastore_search",
            Action::SiteRead => "site_read",
            Action::StatusShow => "status_show",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a request goes over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Parameters in the query string
    Get,
    /// Parameters as a JSON object body
    Post,
}

/// A single parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Int(u64),
    Bool(bool),
    /// Sent comma-joined, e.g. `ext_bbox=-10,40,5,52`
    List(Vec<String>),
    /// Sent as a JSON array literal, e.g. `facet.field=["tags","res_format"]`
    JsonArray(Vec<String>),
}

impl ParamValue {
    /// Query-string rendering
    pub fn render(&self) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::List(items) => items.join(","),
            ParamValue::JsonArray(items) => Value::from(items.clone()).to_string(),
        }
    }

    /// JSON body rendering for POST. Comma lists stay strings there too.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Str(s) => Value::String(s.clone()),
            ParamValue::Int(n) => Value::from(*n),
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::List(items) => Value::String(items.join(",")),
            ParamValue::JsonArray(items) => Value::from(items.clone()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<u64> for ParamValue {
    fn from(n: u64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Longest query string still sent as GET; anything longer is POSTed as JSON
/// so proxies do not truncate it
pub const MAX_QUERY_LEN: usize = 2048;

/// An action plus its parameters, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    action: Action,
    params: BTreeMap<String, ParamValue>,
}

impl CatalogRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Only set the parameter when a value is present
    pub fn param_opt<V: Into<ParamValue>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    /// Boolean capability flags are only sent when enabled so the server
    /// default applies otherwise
    pub fn flag(self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.param(name, true)
        } else {
            self
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// GET unless the rendered parameters outgrow [`MAX_QUERY_LEN`]
    pub fn method(&self) -> Method {
        let len: usize = self
            .params
            .iter()
            .map(|(k, v)| k.len() + v.render().len() + 2)
            .sum();
        if len > MAX_QUERY_LEN {
            Method::Post
        } else {
            Method::Get
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Parameters in name order, rendered for a query string
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.render()))
            .collect()
    }

    pub fn json_body(&self) -> Value {
        let body: Map<String, Value> = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(body)
    }
}

fn non_negative(field: &str, value: Option<i64>) -> Result<Option<u64>> {
    match value {
        Some(n) if n < 0 => Err(ClientError::validation(
            field,
            format!("must be non-negative, got {}", n),
        )),
        Some(n) => Ok(Some(n as u64)),
        None => Ok(None),
    }
}

/// Blank ids are refused; anything else goes out exactly as given
pub(crate) fn required_id(field: &str, id: &str) -> Result<String> {
    if id.trim().is_empty() {
        return Err(ClientError::validation(field, "must not be empty"));
    }
    Ok(id.to_string())
}

/// Pagination and options for the `*_list` actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Return objects instead of names (organization/group/tag lists)
    pub all_fields: bool,
    /// Restrict `tag_list` to a vocabulary
    pub vocabulary_id: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn all_fields(mut self, all_fields: bool) -> Self {
        self.all_fields = all_fields;
        self
    }

    /// Validated limit, if one was requested
    pub fn checked_limit(&self) -> Result<Option<usize>> {
        Ok(non_negative("limit", self.limit)?.map(|n| n as usize))
    }

    pub fn to_request(&self, action: Action) -> Result<CatalogRequest> {
        let limit = non_negative("limit", self.limit)?;
        let offset = non_negative("offset", self.offset)?;

        let mut request = CatalogRequest::new(action).param_opt("limit", limit);
        // offset defaults to 0; only meaningful alongside a limit
        if limit.is_some() || offset.unwrap_or(0) > 0 {
            request = request.param("offset", offset.unwrap_or(0));
        }
        request = request.flag("all_fields", self.all_fields);
        if let Some(vocab) = self.vocabulary_id.as_deref().filter(|v| !v.trim().is_empty()) {
            request = request.param("vocabulary_id", vocab.trim());
        }
        Ok(request)
    }
}

/// Arguments for the `*_show` actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowQuery {
    pub id: String,
    /// Embed member packages (organization/group show)
    pub include_datasets: bool,
    /// Keep extension fields on the normalized record
    pub full_details: bool,
}

impl ShowQuery {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn include_datasets(mut self, include: bool) -> Self {
        self.include_datasets = include;
        self
    }

    pub fn full_details(mut self, full: bool) -> Self {
        self.full_details = full;
        self
    }

    pub fn to_request(&self, action: Action) -> Result<CatalogRequest> {
        let id = required_id("id", &self.id)?;
        let request = CatalogRequest::new(action).param("id", id);
        let request = match action {
            Action::OrganizationShow | Action::GroupShow => request
                .flag("include_datasets", self.include_datasets)
                .flag("include_extras", self.full_details),
            Action::PackageShow => request.flag("include_tracking", self.full_details),
            _ => request,
        };
        Ok(request)
    }
}

/// Arguments for `package_search`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    /// Free text; `*:*` when absent or blank
    pub q: Option<String>,
    pub filters: FilterQuery,
    /// Raw filter expression appended to the rendered filters
    pub fq: Option<String>,
    pub sort: Option<Sort>,
    pub rows: Option<i64>,
    pub start: Option<i64>,
    pub facet_fields: Vec<String>,
    /// Geographic restriction (needs the spatial extension on the server)
    pub spatial: Option<Spatial>,
    /// Keep extension fields on the returned packages
    pub full_details: bool,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn rows(mut self, rows: i64) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn filter<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = self.filters.any_of(field, values);
        self
    }

    /// Restrict to packages created in `[start, end]`; `None` leaves a side
    /// open. Fails when `start` is after `end`.
    pub fn created_between(
        self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if start.is_none() && end.is_none() {
            return Ok(self);
        }
        Ok(self.date_range(DateRange::new(CREATED_FIELD, start, end)?))
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.filters = self.filters.date_range(range);
        self
    }

    pub fn spatial(mut self, spatial: Spatial) -> Self {
        self.spatial = Some(spatial);
        self
    }

    pub fn facets<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facet_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn checked_rows(&self) -> Result<Option<usize>> {
        Ok(non_negative("rows", self.rows)?.map(|n| n as usize))
    }

    /// Full filter-query expression: rendered clauses, then the raw `fq`
    pub fn filter_expression(&self) -> Option<String> {
        let rendered = self.filters.render();
        let raw = self.fq.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (rendered, raw) {
            (Some(clauses), Some(raw)) => Some(format!("{} AND {}", clauses, raw)),
            (Some(clauses), None) => Some(clauses),
            (None, Some(raw)) => Some(raw.to_string()),
            (None, None) => None,
        }
    }

    pub fn to_request(&self) -> Result<CatalogRequest> {
        let rows = non_negative("rows", self.rows)?;
        let start = non_negative("start", self.start)?;
        let q = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(MATCH_ALL);

        let mut request = CatalogRequest::new(Action::PackageSearch)
            .param("q", q)
            .param_opt("fq", self.filter_expression())
            .param_opt("sort", self.sort.as_ref().map(Sort::to_string))
            .param_opt("rows", rows)
            .param_opt("start", start);

        if !self.facet_fields.is_empty() {
            request = request
                .param("facet", true)
                .param("facet.field", ParamValue::JsonArray(self.facet_fields.clone()));
        }
        if let Some(spatial) = &self.spatial {
            let (name, value) = spatial.param();
            request = request.param(name, value);
        }
        Ok(request)
    }
}
