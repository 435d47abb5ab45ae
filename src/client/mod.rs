//! Catalog client: one method per supported action
//!
//! Each method validates its arguments, builds a [`CatalogRequest`], hands it
//! to the [`Transport`] and normalizes the result. Nothing is cached and no
//! call is retried.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::model::{
    normalize, Detail, Group, Organization, Package, PortalStats, Resource, SearchResult,
    SiteStatus, Tag,
};
use crate::query::{Action, CatalogRequest, ListQuery, SearchQuery, ShowQuery};
use crate::transport::{HttpTransport, Transport};

pub mod analysis;
pub mod download;
pub mod export;
pub mod preview;

pub use analysis::{AnalyticsTarget, Metric, QualityCheck, Relation};
pub use download::{DownloadOptions, DownloadReport};
pub use export::ExportFormat;

/// Page size [`CatalogClient::package_list_all`] uses when none is given
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Hard stop for [`CatalogClient::package_list_all`]
pub const MAX_PAGES: usize = 10_000;

/// Facet fields asked for when a faceted search names none
pub const DEFAULT_FACETS: [&str; 3] = ["tags", "organization", "res_format"];

/// Handle to one catalog instance; cheap to clone and safe to share
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient").finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a client talking HTTP to `config.base_url`
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(config)?)))
    }

    /// Create a client over any transport (tests, proxies)
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn call(&self, request: CatalogRequest) -> Result<serde_json::Value> {
        self.transport.call(&request).await.into_result()
    }

    /// Package names, at most `limit` of them
    pub async fn package_list(&self, query: &ListQuery) -> Result<Vec<String>> {
        let request = query.to_request(Action::PackageList)?;
        let limit = query.checked_limit()?;
        let mut names = normalize::package_names(&self.call(request).await?)?;
        truncate(&mut names, limit);
        Ok(names)
    }

    /// Every package name, fetched page by page.
    ///
    /// Stops on a short page. A server that ignores `offset` (a page with no
    /// new names) or `limit` (a page longer than asked for) also ends the
    /// walk, since further pages would only repeat it.
    pub async fn package_list_all(&self, page_size: Option<i64>) -> Result<Vec<String>> {
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size <= 0 {
            return Err(ClientError::validation(
                "page_size",
                format!("must be positive, got {}", page_size),
            ));
        }
        let expected = page_size as usize;

        let mut all = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0i64;
        for page_number in 0..MAX_PAGES {
            let request = ListQuery::new()
                .limit(page_size)
                .offset(offset)
                .to_request(Action::PackageList)?;
            let page = normalize::package_names(&self.call(request).await?)?;
            let fetched = page.len();

            let before = all.len();
            for name in page {
                if seen.insert(name.clone()) {
                    all.push(name);
                }
            }
            let fresh = all.len() - before;

            if fetched < expected {
                return Ok(all);
            }
            if fetched > expected {
                tracing::warn!(page_size, fetched, "package_list ignored limit, stopping");
                return Ok(all);
            }
            if fresh == 0 {
                tracing::warn!(page_number, offset, "package_list repeated a page, stopping");
                return Ok(all);
            }
            offset += fetched as i64;
        }

        Err(ClientError::protocol(format!(
            "package_list still returning full pages after {} pages",
            MAX_PAGES
        )))
    }

    pub async fn package_show(&self, query: &ShowQuery) -> Result<Package> {
        let request = query.to_request(Action::PackageShow)?;
        let result = self.call(request).await?;
        normalize::package(&result, Detail::from_flag(query.full_details))
    }

    pub async fn package_search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let request = query.to_request()?;
        let rows = query.checked_rows()?;
        let result = self.call(request).await?;
        let mut found = normalize::search_result(&result, Detail::from_flag(query.full_details))?;
        truncate(&mut found.results, rows);
        Ok(found)
    }

    /// Search that always counts facets, [`DEFAULT_FACETS`] unless the query
    /// names its own
    pub async fn faceted_search(&self, query: &SearchQuery) -> Result<SearchResult> {
        if !query.facet_fields.is_empty() {
            return self.package_search(query).await;
        }
        let query = query.clone().facets(DEFAULT_FACETS);
        self.package_search(&query).await
    }

    pub async fn organization_list(&self, query: &ListQuery) -> Result<Vec<Organization>> {
        self.group_like_list(Action::OrganizationList, query).await
    }

    pub async fn organization_show(&self, query: &ShowQuery) -> Result<Organization> {
        let request = query.to_request(Action::OrganizationShow)?;
        let result = self.call(request).await?;
        normalize::group(&result, Detail::from_flag(query.full_details))
    }

    pub async fn group_list(&self, query: &ListQuery) -> Result<Vec<Group>> {
        self.group_like_list(Action::GroupList, query).await
    }

    pub async fn group_show(&self, query: &ShowQuery) -> Result<Group> {
        let request = query.to_request(Action::GroupShow)?;
        let result = self.call(request).await?;
        normalize::group(&result, Detail::from_flag(query.full_details))
    }

    async fn group_like_list(&self, action: Action, query: &ListQuery) -> Result<Vec<Group>> {
        let request = query.to_request(action)?;
        let limit = query.checked_limit()?;
        let mut groups = normalize::groups(&self.call(request).await?)?;
        truncate(&mut groups, limit);
        Ok(groups)
    }

    pub async fn tag_list(&self, query: &ListQuery) -> Result<Vec<Tag>> {
        let request = query.to_request(Action::TagList)?;
        let limit = query.checked_limit()?;
        let mut tags = normalize::tags(&self.call(request).await?)?;
        truncate(&mut tags, limit);
        Ok(tags)
    }

    pub async fn resource_show(&self, id: &str) -> Result<Resource> {
        let request = ShowQuery::new(id).to_request(Action::ResourceShow)?;
        normalize::resource(&self.call(request).await?)
    }

    pub async fn site_read(&self) -> Result<bool> {
        normalize::site_read(&self.call(CatalogRequest::new(Action::SiteRead)).await?)
    }

    pub async fn status_show(&self) -> Result<SiteStatus> {
        normalize::site_status(&self.call(CatalogRequest::new(Action::StatusShow)).await?)
    }

    /// Portal-wide counts: packages, organizations, tags, and the CKAN version
    pub async fn statistics(&self) -> Result<PortalStats> {
        let count_only = SearchQuery::new().rows(0);
        let everything = ListQuery::new();
        let (search, organizations, tags, status) = tokio::try_join!(
            self.package_search(&count_only),
            self.organization_list(&everything),
            self.tag_list(&everything),
            self.status_show(),
        )?;
        Ok(normalize::portal_stats(
            &search,
            organizations.len(),
            tags.len(),
            &status,
        ))
    }
}

fn truncate<T>(items: &mut Vec<T>, limit: Option<usize>) {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
}
