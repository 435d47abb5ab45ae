//! Package metadata in other vocabularies: DCAT and schema.org JSON-LD, or
//! the normalized record itself

use chrono::{NaiveDateTime, Utc};
use futures_util::future::try_join_all;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use super::CatalogClient;
use crate::error::{ClientError, Result};
use crate::model::{MetadataExport, Package};
use crate::query::{required_id, ShowQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Dcat,
    SchemaOrg,
    CkanNative,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Dcat => "dcat",
            ExportFormat::SchemaOrg => "schema_org",
            ExportFormat::CkanNative => "ckan_native",
        }
    }

    /// Render one package
    pub fn render(&self, pkg: &Package, include_resources: bool) -> Result<Value> {
        match self {
            ExportFormat::Dcat => Ok(dcat(pkg, include_resources)),
            ExportFormat::SchemaOrg => Ok(schema_org(pkg, include_resources)),
            ExportFormat::CkanNative => {
                let mut value = serde_json::to_value(pkg).map_err(|e| {
                    ClientError::protocol(format!("failed to encode package: {}", e))
                })?;
                if !include_resources {
                    if let Some(map) = value.as_object_mut() {
                        map.remove("resources");
                    }
                }
                Ok(value)
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dcat" => Ok(ExportFormat::Dcat),
            "schema_org" | "schema.org" => Ok(ExportFormat::SchemaOrg),
            "ckan_native" | "ckan" => Ok(ExportFormat::CkanNative),
            other => Err(ClientError::validation(
                "export_format",
                format!("expected dcat, schema_org or ckan_native, got `{}`", other),
            )),
        }
    }
}

fn iso(t: Option<NaiveDateTime>) -> Value {
    match t {
        Some(t) => Value::String(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        None => Value::Null,
    }
}

fn publisher_name(pkg: &Package) -> Value {
    match &pkg.organization {
        Some(org) => Value::String(org.display_name().to_string()),
        None => Value::Null,
    }
}

fn dcat(pkg: &Package, include_resources: bool) -> Value {
    let mut dataset = json!({
        "@type": "dcat:Dataset",
        "dct:identifier": pkg.id,
        "dct:title": pkg.title,
        "dct:description": pkg.notes,
        "dcat:keyword": pkg.tag_names(),
        "dct:issued": iso(pkg.metadata_created),
        "dct:modified": iso(pkg.metadata_modified),
        "dct:publisher": {
            "@type": "foaf:Organization",
            "foaf:name": publisher_name(pkg),
        },
    });
    if include_resources {
        dataset["dcat:distribution"] = pkg
            .resources
            .iter()
            .map(|r| {
                json!({
                    "@type": "dcat:Distribution",
                    "dct:identifier": r.id,
                    "dct:title": r.name,
                    "dcat:accessURL": r.url,
                    "dct:format": r.format,
                    "dcat:byteSize": r.size,
                })
            })
            .collect();
    }
    dataset
}

fn schema_org(pkg: &Package, include_resources: bool) -> Value {
    let mut dataset = json!({
        "@context": "https://schema.org/",
        "@type": "Dataset",
        "name": pkg.title,
        "description": pkg.notes,
        "identifier": pkg.id,
        "keywords": pkg.tag_names(),
        "dateCreated": iso(pkg.metadata_created),
        "dateModified": iso(pkg.metadata_modified),
        "publisher": {
            "@type": "Organization",
            "name": publisher_name(pkg),
        },
    });
    if include_resources {
        dataset["distribution"] = pkg
            .resources
            .iter()
            .map(|r| {
                json!({
                    "@type": "DataDownload",
                    "name": r.name,
                    "contentUrl": r.url,
                    "encodingFormat": r.format,
                    "contentSize": r.size,
                })
            })
            .collect();
    }
    dataset
}

impl CatalogClient {
    /// Fetch every package in `ids` (concurrently, output in input order)
    /// and render it in `format`. All ids are checked before the first call.
    pub async fn metadata_export(
        &self,
        ids: &[String],
        format: ExportFormat,
        include_resources: bool,
    ) -> Result<MetadataExport> {
        if ids.is_empty() {
            return Err(ClientError::validation("dataset_ids", "must not be empty"));
        }
        for id in ids {
            required_id("dataset_ids", id)?;
        }

        let packages = try_join_all(ids.iter().map(|id| {
            let query = ShowQuery::new(id.as_str()).full_details(format == ExportFormat::CkanNative);
            async move { self.package_show(&query).await }
        }))
        .await?;

        let datasets = packages
            .iter()
            .map(|pkg| format.render(pkg, include_resources))
            .collect::<Result<Vec<_>>>()?;
        Ok(MetadataExport {
            export_format: format.as_str(),
            timestamp: Utc::now(),
            datasets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{normalize, Detail};

    fn sample() -> Package {
        normalize::package(
            &json!({
                "id": "p1",
                "name": "ev",
                "title": "EV Registrations",
                "notes": "By county",
                "organization": {"name": "dmv", "title": "DMV"},
                "metadata_created": "2024-03-01T10:15:30.123456",
                "tags": [{"name": "EV"}, {"name": "transport"}],
                "resources": [{"id": "r1", "name": "data.csv", "format": "CSV", "url": "https://x/data.csv", "size": 10}]
            }),
            Detail::Summary,
        )
        .unwrap()
    }

    #[test]
    fn dcat_document() {
        let doc = ExportFormat::Dcat.render(&sample(), true).unwrap();
        assert_eq!(doc["@type"], "dcat:Dataset");
        assert_eq!(doc["dcat:keyword"], json!(["EV", "transport"]));
        assert_eq!(doc["dct:issued"], "2024-03-01T10:15:30");
        assert_eq!(doc["dct:modified"], Value::Null);
        assert_eq!(doc["dct:publisher"]["foaf:name"], "DMV");
        assert_eq!(doc["dcat:distribution"][0]["dcat:accessURL"], "https://x/data.csv");
        assert_eq!(doc["dcat:distribution"][0]["dcat:byteSize"], 10);
    }

    #[test]
    fn schema_org_without_resources() {
        let doc = ExportFormat::SchemaOrg.render(&sample(), false).unwrap();
        assert_eq!(doc["@context"], "https://schema.org/");
        assert_eq!(doc["name"], "EV Registrations");
        assert!(doc.get("distribution").is_none());

        let native = ExportFormat::CkanNative.render(&sample(), false).unwrap();
        assert_eq!(native["name"], "ev");
        assert!(native.get("resources").is_none());
    }

    #[test]
    fn format_names() {
        assert_eq!("schema.org".parse::<ExportFormat>().unwrap(), ExportFormat::SchemaOrg);
        assert_eq!("DCAT".parse::<ExportFormat>().unwrap(), ExportFormat::Dcat);
        assert!("rdf".parse::<ExportFormat>().is_err());
    }
}
