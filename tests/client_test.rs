mod common;

use ckan_explorer::client::{
    ExportFormat, Metric, QualityCheck, Relation, DEFAULT_FACETS, DEFAULT_PAGE_SIZE,
};
use ckan_explorer::query::{
    Action, CatalogRequest, ListQuery, SearchQuery, ShowQuery, Sort, Spatial,
};
use ckan_explorer::ErrorKind;
use common::{int_param, package, panicking_client, param, ScriptedTransport};
use serde_json::json;

#[tokio::test]
async fn test_search_round_trip() {
    common::init_test_logging();
    let (transport, client) = ScriptedTransport::new()
        .success(
            Action::PackageSearch,
            json!({
                "count": 42,
                "results": [
                    package("ev-registrations", "EV Registrations"),
                    package("air-quality", "Air Quality"),
                    package("heat-map", "Heat Map"),
                ],
            }),
        )
        .into_client();

    let query = SearchQuery::new().query("climate").rows(3);
    let found = client.package_search(&query).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].action(), Action::PackageSearch);
    assert_eq!(param(&requests[0], "q").as_deref(), Some("climate"));
    assert_eq!(param(&requests[0], "rows").as_deref(), Some("3"));
    assert_eq!(param(&requests[0], "sort"), None);

    assert!(found.count >= 3);
    let names: Vec<&str> = found.results.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["ev-registrations", "air-quality", "heat-map"]);
    assert_eq!(found.results[0].resources.len(), 1);
    assert_eq!(
        found.results[0].organization.as_ref().unwrap().display_name(),
        "City of X"
    );
}

#[tokio::test]
async fn test_search_sends_filters_and_sort() {
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageSearch, json!({"count": 0, "results": []}))
        .into_client();

    let query = SearchQuery::new()
        .filter("tags", ["EV", "Population"])
        .filter("organization", ["city-of-x"])
        .sort("metadata_modified desc".parse::<Sort>().unwrap());
    let found = client.package_search(&query).await.unwrap();
    assert_eq!(found.count, 0);
    assert!(found.results.is_empty());

    let request = &transport.requests()[0];
    assert_eq!(param(request, "q").as_deref(), Some("*:*"));
    assert_eq!(
        param(request, "fq").as_deref(),
        Some("tags:(EV OR Population) AND organization:city-of-x")
    );
    assert_eq!(param(request, "sort").as_deref(), Some("metadata_modified desc"));
}

#[tokio::test]
async fn test_search_count_never_below_results() {
    let (_, client) = ScriptedTransport::new()
        .success(
            Action::PackageSearch,
            json!({"count": 1, "results": [package("a", "A"), package("b", "B")]}),
        )
        .into_client();

    let found = client.package_search(&SearchQuery::new()).await.unwrap();
    assert_eq!(found.count, 2);
}

#[tokio::test]
async fn test_list_respects_limit() {
    let names: Vec<String> = (0..25).map(|i| format!("dataset-{}", i)).collect();
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageList, json!(names))
        .into_client();

    let listed = client
        .package_list(&ListQuery::new().limit(10))
        .await
        .unwrap();
    assert!(listed.len() <= 10);
    assert_eq!(listed[0], "dataset-0");

    let request = &transport.requests()[0];
    assert_eq!(param(request, "limit").as_deref(), Some("10"));
    assert_eq!(param(request, "offset").as_deref(), Some("0"));
}

#[tokio::test]
async fn test_zero_limit_returns_nothing() {
    let (_, client) = ScriptedTransport::new()
        .success(Action::TagList, json!(["a", "b"]))
        .into_client();
    let tags = client.tag_list(&ListQuery::new().limit(0)).await.unwrap();
    assert!(tags.is_empty());
}

/// `package_list` over `names` that honours limit and offset
fn paged(names: Vec<String>) -> impl Fn(&CatalogRequest) -> serde_json::Value + Send + Sync {
    move |request| {
        let offset = int_param(request, "offset", 0).min(names.len());
        let limit = int_param(request, "limit", names.len());
        let end = (offset + limit).min(names.len());
        json!(names[offset..end])
    }
}

fn dataset_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("dataset-{}", i)).collect()
}

#[tokio::test]
async fn test_package_list_all_follows_offsets() {
    let (transport, client) = ScriptedTransport::new()
        .respond(Action::PackageList, paged(dataset_names(7)))
        .into_client();

    let all = client.package_list_all(Some(3)).await.unwrap();
    assert_eq!(all, dataset_names(7));

    let offsets: Vec<String> = transport
        .requests()
        .iter()
        .filter_map(|r| param(r, "offset"))
        .collect();
    assert_eq!(offsets, vec!["0", "3", "6"]);
    assert!(transport
        .requests()
        .iter()
        .all(|r| param(r, "limit").as_deref() == Some("3")));
}

#[tokio::test]
async fn test_package_list_all_exact_multiple_ends_on_empty_page() {
    let (transport, client) = ScriptedTransport::new()
        .respond(Action::PackageList, paged(dataset_names(6)))
        .into_client();

    let all = client.package_list_all(Some(3)).await.unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn test_package_list_all_stops_when_offset_is_ignored() {
    // every call answers with the first full page
    let (transport, client) = ScriptedTransport::new()
        .respond(Action::PackageList, |_: &CatalogRequest| json!(["a", "b", "c"]))
        .into_client();

    let all = client.package_list_all(Some(3)).await.unwrap();
    assert_eq!(all, vec!["a", "b", "c"]);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_package_list_all_stops_when_limit_is_ignored() {
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageList, json!(dataset_names(25)))
        .into_client();

    let all = client.package_list_all(Some(10)).await.unwrap();
    assert_eq!(all.len(), 25);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_package_list_all_default_page_and_bad_page_size() {
    let (transport, client) = ScriptedTransport::new()
        .respond(Action::PackageList, paged(dataset_names(5)))
        .into_client();
    assert_eq!(client.package_list_all(None).await.unwrap().len(), 5);
    assert_eq!(
        param(&transport.requests()[0], "limit").as_deref(),
        Some(DEFAULT_PAGE_SIZE.to_string().as_str())
    );

    for bad in [0, -5] {
        let err = panicking_client()
            .package_list_all(Some(bad))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[tokio::test]
async fn test_missing_resources_become_empty() {
    let (_, client) = ScriptedTransport::new()
        .success(
            Action::PackageShow,
            json!({"id": "p1", "name": "no-files", "title": "No Files"}),
        )
        .into_client();

    let pkg = client.package_show(&ShowQuery::new("no-files")).await.unwrap();
    assert!(pkg.resources.is_empty());
    assert!(pkg.tags.is_empty());
    assert_eq!(pkg.num_resources, 0);
    assert_eq!(pkg.display_name(), "No Files");
}

#[tokio::test]
async fn test_blank_id_never_reaches_network() {
    let client = panicking_client();
    for id in ["", "   "] {
        let err = client.package_show(&ShowQuery::new(id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = client.organization_show(&ShowQuery::new(id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = client.resource_show(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[tokio::test]
async fn test_negative_bounds_never_reach_network() {
    let client = panicking_client();
    let err = client
        .package_list(&ListQuery::new().limit(-1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = client
        .package_search(&SearchQuery::new().start(-2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_remote_not_found() {
    let (_, client) = ScriptedTransport::new()
        .failure(Action::PackageShow, 404, "Not Found Error", "Not found")
        .into_client();

    let err = client
        .package_show(&ShowQuery::new("missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_html_error_page_is_protocol_error() {
    let (_, client) = ScriptedTransport::new()
        .raw(
            Action::StatusShow,
            502,
            b"<html><body>Bad Gateway</body></html>".to_vec(),
        )
        .into_client();

    let err = client.status_show().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().contains("502"));
}

#[tokio::test]
async fn test_organization_show_with_datasets() {
    let (transport, client) = ScriptedTransport::new()
        .success(
            Action::OrganizationShow,
            json!({
                "id": "org-1",
                "name": "city-of-x",
                "title": "City of X",
                "is_organization": true,
                "package_count": "2",
                "packages": [package("a", "A"), package("b", "B")],
            }),
        )
        .into_client();

    let org = client
        .organization_show(&ShowQuery::new("city-of-x").include_datasets(true))
        .await
        .unwrap();
    assert!(org.is_organization);
    assert_eq!(org.package_count, Some(2));
    assert_eq!(org.packages.as_ref().map(Vec::len), Some(2));

    let request = &transport.requests()[0];
    assert_eq!(param(request, "include_datasets").as_deref(), Some("true"));
}

#[tokio::test]
async fn test_statistics_combines_four_calls() {
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageSearch, json!({"count": 120, "results": []}))
        .success(Action::OrganizationList, json!(["a", "b", "c"]))
        .success(Action::TagList, json!(["x", "y"]))
        .success(Action::StatusShow, json!({"ckan_version": "2.10.4"}))
        .into_client();

    let stats = client.statistics().await.unwrap();
    assert_eq!(stats.total_packages, 120);
    assert_eq!(stats.total_organizations, 3);
    assert_eq!(stats.total_tags, 2);
    assert_eq!(stats.ckan_version, "2.10.4");
    assert_eq!(transport.requests().len(), 4);
}

#[tokio::test]
async fn test_unscripted_action_is_transport_error() {
    let (_, client) = ScriptedTransport::new().into_client();
    let err = client.site_read().await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_group_show() {
    let (transport, client) = ScriptedTransport::new()
        .success(
            Action::GroupShow,
            json!({"id": "g1", "name": "transport", "title": "Transport", "package_count": 4}),
        )
        .into_client();

    let group = client
        .group_show(&ShowQuery::new("transport"))
        .await
        .unwrap();
    assert!(!group.is_organization);
    assert_eq!(group.display_name(), "Transport");
    assert_eq!(transport.requests()[0].action(), Action::GroupShow);
}

#[tokio::test]
async fn test_faceted_search_defaults_facets_and_sends_area() {
    let (transport, client) = ScriptedTransport::new()
        .success(
            Action::PackageSearch,
            json!({
                "count": 1,
                "results": [package("a", "A")],
                "search_facets": {"res_format": {"items": [{"name": "CSV", "count": 1}]}}
            }),
        )
        .into_client();

    let query = SearchQuery::new()
        .query("air")
        .spatial(Spatial::bbox([-10.5, 40.0, 5.0, 52.25]).unwrap());
    let found = client.faceted_search(&query).await.unwrap();
    assert_eq!(found.facets["res_format"]["CSV"], 1);

    let request = &transport.requests()[0];
    assert_eq!(param(request, "facet").as_deref(), Some("true"));
    assert_eq!(
        param(request, "facet.field"),
        Some(serde_json::to_string(&DEFAULT_FACETS).unwrap())
    );
    assert_eq!(param(request, "ext_bbox").as_deref(), Some("-10.5,40,5,52.25"));
}

fn with_groups(name: &str) -> serde_json::Value {
    let mut pkg = package(name, "Source");
    pkg["groups"] = json!([{"id": "g1", "name": "transport"}]);
    pkg
}

#[tokio::test]
async fn test_related_datasets_exclude_the_source() {
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageShow, package("ev", "EV"))
        .success(
            Action::PackageSearch,
            json!({"count": 3, "results": [package("ev", "EV"), package("a", "A"), package("b", "B")]}),
        )
        .into_client();

    let related = client
        .related_datasets("ev", Relation::Tags, 2)
        .await
        .unwrap();
    let names: Vec<&str> = related.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    let search = &transport.requests()[1];
    assert_eq!(param(search, "fq").as_deref(), Some("tags:climate"));
    assert_eq!(param(search, "rows").as_deref(), Some("3"));
}

#[tokio::test]
async fn test_related_by_organization_and_theme() {
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageShow, with_groups("ev"))
        .success(Action::PackageSearch, json!({"count": 0, "results": []}))
        .into_client();

    client
        .related_datasets("ev", Relation::Organization, 5)
        .await
        .unwrap();
    client.related_datasets("ev", Relation::Theme, 5).await.unwrap();

    let fqs: Vec<String> = transport
        .requests()
        .iter()
        .filter(|r| r.action() == Action::PackageSearch)
        .filter_map(|r| param(r, "fq"))
        .collect();
    assert_eq!(fqs, vec!["organization:city-of-x", "groups:transport"]);
}

#[tokio::test]
async fn test_related_without_anything_to_share_skips_search() {
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageShow, json!({"id": "p1", "name": "bare"}))
        .into_client();

    let related = client
        .related_datasets("bare", Relation::Tags, 10)
        .await
        .unwrap();
    assert!(related.is_empty());
    assert_eq!(transport.requests().len(), 1);

    let err = panicking_client()
        .related_datasets("bare", Relation::Tags, -1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_resource_preview_reads_datastore() {
    let (transport, client) = ScriptedTransport::new()
        .success(
            Action::ResourceShow,
            json!({"id": "r1", "name": "data.csv", "format": "CSV", "url": "https://x/data.csv"}),
        )
        .success(
            Action::DatastoreSearch,
            json!({
                "total": 40,
                "fields": [{"id": "_id", "type": "int"}, {"id": "station", "type": "text"}],
                "records": [{"_id": 1, "station": "A"}, {"_id": 2, "station": "B"}]
            }),
        )
        .into_client();

    let preview = client.resource_preview("r1", 2, true).await.unwrap();
    let datastore = preview.datastore.unwrap();
    assert_eq!(datastore.total_records, 40);
    assert_eq!(datastore.records.len(), 2);
    assert_eq!(datastore.fields[1].field_type, "text");
    assert!(preview.note.is_none());

    let lookup = &transport.requests()[1];
    assert_eq!(lookup.action(), Action::DatastoreSearch);
    assert_eq!(param(lookup, "resource_id").as_deref(), Some("r1"));
    assert_eq!(param(lookup, "limit").as_deref(), Some("2"));

    let without_fields = client.resource_preview("r1", 1, false).await.unwrap();
    let datastore = without_fields.datastore.unwrap();
    assert_eq!(datastore.records.len(), 1);
    assert!(datastore.fields.is_empty());
}

#[tokio::test]
async fn test_resource_preview_outside_datastore() {
    let (_, client) = ScriptedTransport::new()
        .success(Action::ResourceShow, json!({"id": "r1", "url": "https://x/report.pdf"}))
        .failure(
            Action::DatastoreSearch,
            404,
            "Not Found Error",
            "Resource \"r1\" was not found.",
        )
        .into_client();

    let preview = client.resource_preview("r1", 10, true).await.unwrap();
    assert!(preview.datastore.is_none());
    assert!(preview.note.unwrap().contains("DataStore"));
    assert_eq!(preview.resource.id, "r1");
}

#[tokio::test]
async fn test_resource_preview_network_failure_is_an_error() {
    let (_, client) = ScriptedTransport::new()
        .success(Action::ResourceShow, json!({"id": "r1"}))
        .into_client();
    let err = client.resource_preview("r1", 10, true).await.unwrap_err();
    assert!(err.is_transport());

    let err = panicking_client()
        .resource_preview("r1", -1, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_data_quality_check_scores_full_record() {
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageShow, package("a", "A"))
        .into_client();

    let report = client.data_quality_check("a", &[]).await.unwrap();
    assert!(report.completeness.is_some());
    assert!(report.format_validation.is_some());
    assert!(report.schema_compliance.is_some());
    // package() has no notes, so four of five fields are present
    assert_eq!(report.completeness.unwrap().missing_fields, vec!["notes"]);
    assert_eq!(report.format_validation.unwrap().score, 100.0);

    let request = &transport.requests()[0];
    assert_eq!(param(request, "include_tracking").as_deref(), Some("true"));

    let only = client
        .data_quality_check("a", &[QualityCheck::FormatValidation])
        .await
        .unwrap();
    assert!(only.completeness.is_none());
    assert_eq!(only.overall_score, 100.0);
}

#[tokio::test]
async fn test_dataset_analytics_reads_tracking() {
    let mut tracked = package("a", "A");
    tracked["tracking_summary"] = json!({"total": 12, "recent": 3});
    let (transport, client) = ScriptedTransport::new()
        .success(Action::PackageShow, tracked)
        .into_client();

    let analytics = client.dataset_analytics("a", &[]).await.unwrap();
    assert_eq!(analytics.views, Some(12));
    assert_eq!(analytics.recent_views, Some(3));
    assert_eq!(analytics.resource_count, Some(1));
    assert_eq!(analytics.organization.as_deref(), Some("City of X"));
    assert_eq!(
        param(&transport.requests()[0], "include_tracking").as_deref(),
        Some("true")
    );

    let counts_only = client
        .dataset_analytics("a", &[Metric::ResourceCount])
        .await
        .unwrap();
    assert_eq!(counts_only.views, None);
    assert_eq!(param(&transport.requests()[1], "include_tracking"), None);
}

#[tokio::test]
async fn test_portal_analytics_ranks_newest_and_largest() {
    let (transport, client) = ScriptedTransport::new()
        .success(Action::StatusShow, json!({"ckan_version": "2.10.4"}))
        .respond(Action::PackageSearch, |request: &CatalogRequest| {
            let newest = param(request, "sort").as_deref() == Some("metadata_created desc");
            let first = if newest { "new" } else { "big" };
            json!({"count": 250, "results": [package(first, "X")]})
        })
        .into_client();

    let analytics = client.portal_analytics().await.unwrap();
    assert_eq!(analytics.total_datasets, 250);
    assert_eq!(analytics.site_status.ckan_version, "2.10.4");
    assert_eq!(analytics.recent_datasets[0].name, "new");
    assert_eq!(analytics.popular_datasets[0].name, "big");
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn test_metadata_export_keeps_input_order() {
    let (transport, client) = ScriptedTransport::new()
        .respond(Action::PackageShow, |request: &CatalogRequest| {
            let id = param(request, "id").unwrap_or_default();
            package(&id, &id.to_uppercase())
        })
        .into_client();

    let ids = vec!["b".to_string(), "a".to_string()];
    let export = client
        .metadata_export(&ids, ExportFormat::SchemaOrg, false)
        .await
        .unwrap();
    assert_eq!(export.export_format, "schema_org");
    let names: Vec<&str> = export
        .datasets
        .iter()
        .filter_map(|d| d["name"].as_str())
        .collect();
    assert_eq!(names, vec!["B", "A"]);
    assert!(export.datasets[0].get("distribution").is_none());
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_metadata_export_checks_every_id_first() {
    let client = panicking_client();
    let err = client
        .metadata_export(&[], ExportFormat::Dcat, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let ids = vec!["a".to_string(), " ".to_string()];
    let err = client
        .metadata_export(&ids, ExportFormat::Dcat, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
