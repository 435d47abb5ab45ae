//! JSON → record conversion for each action's `result`

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{
    DatastorePreview, Detail, EntityRef, FieldInfo, Group, Package, PortalStats, Resource,
    SearchResult, SiteStatus, Tag, Tracking,
};
use crate::error::{ClientError, Result};

/// Core package keys; everything else is an extension field
const PACKAGE_KEYS: &[&str] = &[
    "id",
    "name",
    "title",
    "notes",
    "organization",
    "owner_org",
    "author",
    "author_email",
    "maintainer",
    "maintainer_email",
    "license_id",
    "license_title",
    "license_url",
    "state",
    "metadata_created",
    "metadata_modified",
    "tags",
    "resources",
    "num_resources",
    "num_tags",
    "extras",
    "groups",
    "type",
    "private",
    "version",
    "url",
    "isopen",
    "creator_user_id",
    "relationships_as_object",
    "relationships_as_subject",
    "tracking_summary",
];

const GROUP_KEYS: &[&str] = &[
    "id",
    "name",
    "title",
    "display_name",
    "description",
    "created",
    "is_organization",
    "package_count",
    "packages",
    "extras",
    "image_url",
    "image_display_url",
    "state",
    "type",
    "approval_status",
    "num_followers",
    "users",
    "tags",
    "groups",
];

fn object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ClientError::protocol(format!("expected {} object, got {}", what, short(value)))
    })
}

fn array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| {
        ClientError::protocol(format!("expected {} list, got {}", what, short(value)))
    })
}

fn short(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 60 {
        format!("{}...", text.chars().take(60).collect::<String>())
    } else {
        text
    }
}

/// Text field with scalar coercion, empty when absent
fn text(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn opt_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    Some(text(map, key)).filter(|s| !s.is_empty())
}

/// Non-negative integer from a number or a numeric string
pub fn count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// CKAN timestamps are usually naive ISO-8601 with microseconds
pub fn timestamp(value: Option<&Value>) -> Option<NaiveDateTime> {
    let s = value?.as_str()?.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn bool_field(map: &Map<String, Value>, key: &str) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Extension fields: the `extras` key/value list plus unknown top-level keys
fn extras(map: &Map<String, Value>, known: &[&str]) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if let Some(Value::Array(items)) = map.get("extras") {
        for item in items {
            if let Some(key) = item.get("key").and_then(Value::as_str) {
                out.insert(
                    key.to_string(),
                    item.get("value").cloned().unwrap_or(Value::Null),
                );
            }
        }
    }
    for (key, value) in map {
        if !known.contains(&key.as_str()) && !value.is_null() {
            out.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    out
}

fn entity_ref(map: &Map<String, Value>) -> Option<EntityRef> {
    match map.get("organization") {
        Some(Value::Object(org)) => Some(EntityRef {
            id: text(org, "id"),
            name: text(org, "name"),
            title: text(org, "title"),
        }),
        Some(Value::String(name)) if !name.is_empty() => Some(EntityRef {
            name: name.clone(),
            ..EntityRef::default()
        }),
        _ => opt_text(map, "owner_org").map(|id| EntityRef {
            id,
            ..EntityRef::default()
        }),
    }
}

fn group_refs(map: &Map<String, Value>) -> Vec<EntityRef> {
    match map.get("groups") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|g| match g {
                Value::Object(g) => Some(EntityRef {
                    id: text(g, "id"),
                    name: text(g, "name"),
                    title: opt_text(g, "title").unwrap_or_else(|| text(g, "display_name")),
                }),
                Value::String(name) if !name.is_empty() => Some(EntityRef {
                    name: name.clone(),
                    ..EntityRef::default()
                }),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn tracking(map: &Map<String, Value>) -> Option<Tracking> {
    let summary = map.get("tracking_summary")?.as_object()?;
    Some(Tracking {
        total: count(summary.get("total")).unwrap_or(0),
        recent: count(summary.get("recent")).unwrap_or(0),
    })
}

pub fn tag(value: &Value) -> Result<Tag> {
    match value {
        Value::String(name) => Ok(Tag {
            name: name.clone(),
            vocabulary_id: None,
        }),
        Value::Object(map) => {
            Ok(Tag {
                name: opt_text(map, "name").unwrap_or_else(|| text(map, "display_name")),
                vocabulary_id: opt_text(map, "vocabulary_id"),
            })
        }
        other => Err(ClientError::protocol(format!(
            "expected tag, got {}",
            short(other)
        ))),
    }
}

pub fn resource(value: &Value) -> Result<Resource> {
    let map = object(value, "resource")?;
    Ok(Resource {
        id: text(map, "id"),
        package_id: text(map, "package_id"),
        name: text(map, "name"),
        format: text(map, "format"),
        url: text(map, "url"),
        description: text(map, "description"),
        size: count(map.get("size")),
        created: timestamp(map.get("created")),
        last_modified: timestamp(map.get("last_modified")),
    })
}

pub fn package(value: &Value, detail: Detail) -> Result<Package> {
    let map = object(value, "package")?;

    let tags = match map.get("tags") {
        Some(Value::Array(items)) => items.iter().filter_map(|t| tag(t).ok()).collect(),
        _ => Vec::new(),
    };
    // a malformed entry is skipped rather than failing the whole package
    let resources: Vec<Resource> = match map.get("resources") {
        Some(Value::Array(items)) => items.iter().filter_map(|r| resource(r).ok()).collect(),
        _ => Vec::new(),
    };
    let num_resources = count(map.get("num_resources"))
        .map(|n| n as usize)
        .unwrap_or(resources.len());

    Ok(Package {
        id: text(map, "id"),
        name: text(map, "name"),
        title: text(map, "title"),
        notes: text(map, "notes"),
        organization: entity_ref(map),
        groups: group_refs(map),
        author: text(map, "author"),
        author_email: text(map, "author_email"),
        maintainer: text(map, "maintainer"),
        maintainer_email: text(map, "maintainer_email"),
        license: opt_text(map, "license_title").unwrap_or_else(|| text(map, "license_id")),
        state: text(map, "state"),
        metadata_created: timestamp(map.get("metadata_created")),
        metadata_modified: timestamp(map.get("metadata_modified")),
        tags,
        resources,
        num_resources,
        tracking: tracking(map),
        extras: match detail {
            Detail::Full => Some(extras(map, PACKAGE_KEYS)),
            Detail::Summary => None,
        },
    })
}

/// Organization/group from a show result or an `all_fields` list entry.
/// A bare string (plain list entry) becomes a name-only record.
pub fn group(value: &Value, detail: Detail) -> Result<Group> {
    if let Value::String(name) = value {
        return Ok(Group {
            name: name.clone(),
            ..Group::default()
        });
    }
    let map = object(value, "organization/group")?;

    let packages = match map.get("packages") {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|p| package(p, detail).ok())
                .collect(),
        ),
        _ => None,
    };

    Ok(Group {
        id: text(map, "id"),
        name: text(map, "name"),
        title: opt_text(map, "title").unwrap_or_else(|| text(map, "display_name")),
        description: text(map, "description"),
        is_organization: bool_field(map, "is_organization"),
        created: timestamp(map.get("created")),
        package_count: count(map.get("package_count")),
        packages,
        extras: match detail {
            Detail::Full => Some(extras(map, GROUP_KEYS)),
            Detail::Summary => None,
        },
    })
}

pub fn groups(value: &Value) -> Result<Vec<Group>> {
    array(value, "organization/group")?
        .iter()
        .map(|g| group(g, Detail::Summary))
        .collect()
}

pub fn tags(value: &Value) -> Result<Vec<Tag>> {
    array(value, "tag")?.iter().map(tag).collect()
}

/// `package_list` returns names; some forks return objects
pub fn package_names(value: &Value) -> Result<Vec<String>> {
    array(value, "package name")?
        .iter()
        .map(|item| match item {
            Value::String(name) => Ok(name.clone()),
            Value::Object(map) => Ok(text(map, "name")),
            other => Err(ClientError::protocol(format!(
                "expected package name, got {}",
                short(other)
            ))),
        })
        .collect()
}

pub fn search_result(value: &Value, detail: Detail) -> Result<SearchResult> {
    let map = object(value, "search result")?;
    let results: Vec<Package> = match map.get("results") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|p| package(p, detail))
            .collect::<Result<_>>()?,
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            return Err(ClientError::protocol(format!(
                "expected search results list, got {}",
                short(other)
            )))
        }
    };
    let total = count(map.get("count"))
        .unwrap_or(0)
        .max(results.len() as u64);

    Ok(SearchResult {
        count: total,
        results,
        facets: facets(map),
    })
}

/// Prefer `search_facets` (`{field: {items: [{name, count}]}}`), fall back to
/// the flat `facets` map (`{field: {value: count}}`)
fn facets(map: &Map<String, Value>) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(search_facets)) = map.get("search_facets") {
        for (field, facet) in search_facets {
            let counts: BTreeMap<String, u64> = facet
                .get("items")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| {
                            let name = item.get("name")?.as_str()?.to_string();
                            Some((name, count(item.get("count"))?))
                        })
                        .collect()
                })
                .unwrap_or_default();
            out.insert(field.clone(), counts);
        }
    }
    if out.is_empty() {
        if let Some(Value::Object(flat)) = map.get("facets") {
            for (field, values) in flat {
                if let Value::Object(values) = values {
                    let counts = values
                        .iter()
                        .filter_map(|(k, v)| Some((k.clone(), count(Some(v))?)))
                        .collect();
                    out.insert(field.clone(), counts);
                }
            }
        }
    }
    out
}

pub fn site_status(value: &Value) -> Result<SiteStatus> {
    let map = object(value, "status")?;
    let extensions = match map.get("extensions") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|e| e.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    Ok(SiteStatus {
        ckan_version: text(map, "ckan_version"),
        site_title: text(map, "site_title"),
        site_description: text(map, "site_description"),
        site_url: text(map, "site_url"),
        locale_default: text(map, "locale_default"),
        extensions,
    })
}

pub fn site_read(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(ClientError::protocol(format!(
            "expected boolean from site_read, got {}",
            short(other)
        ))),
    }
}

/// `datastore_search` result: rows, total and the field list
pub fn datastore(value: &Value) -> Result<DatastorePreview> {
    let map = object(value, "datastore result")?;
    let records = match map.get("records") {
        Some(Value::Array(rows)) => rows.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            return Err(ClientError::protocol(format!(
                "expected datastore records list, got {}",
                short(other)
            )))
        }
    };
    let fields = match map.get("fields") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|f| FieldInfo {
                id: text(f, "id"),
                field_type: text(f, "type"),
                info: f.get("info").filter(|i| !i.is_null()).cloned(),
            })
            .collect(),
        _ => Vec::new(),
    };
    let total_records = count(map.get("total"))
        .unwrap_or(0)
        .max(records.len() as u64);
    Ok(DatastorePreview {
        total_records,
        records,
        fields,
    })
}

pub fn portal_stats(
    search: &SearchResult,
    organizations: usize,
    tags: usize,
    status: &SiteStatus,
) -> PortalStats {
    PortalStats {
        total_packages: search.count,
        total_organizations: organizations as u64,
        total_tags: tags as u64,
        ckan_version: if status.ckan_version.is_empty() {
            "Unknown".to_string()
        } else {
            status.ckan_version.clone()
        },
    }
}
