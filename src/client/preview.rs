//! First rows of a resource through the DataStore

use super::CatalogClient;
use crate::error::{ClientError, Result};
use crate::model::{normalize, ResourcePreview};
use crate::query::{Action, CatalogRequest};

/// Rows previewed when the caller does not say
pub const DEFAULT_PREVIEW_ROWS: i64 = 10;

impl CatalogClient {
    /// Resource metadata plus up to `rows` DataStore records. A resource the
    /// DataStore does not hold still previews, with `datastore: None` and a
    /// note; network failures are errors.
    pub async fn resource_preview(
        &self,
        id: &str,
        rows: i64,
        field_stats: bool,
    ) -> Result<ResourcePreview> {
        if rows < 0 {
            return Err(ClientError::validation(
                "preview_rows",
                format!("must be non-negative, got {}", rows),
            ));
        }
        let resource = self.resource_show(id).await?;
        let resource_id = if resource.id.is_empty() {
            id.to_string()
        } else {
            resource.id.clone()
        };

        let request = CatalogRequest::new(Action::DatastoreSearch)
            .param("resource_id", resource_id)
            .param("limit", rows as u64);
        match self.call(request).await {
            Ok(result) => {
                let mut datastore = normalize::datastore(&result)?;
                datastore.records.truncate(rows as usize);
                if !field_stats {
                    datastore.fields.clear();
                }
                Ok(ResourcePreview {
                    resource,
                    datastore: Some(datastore),
                    note: None,
                })
            }
            Err(err @ ClientError::Remote { .. }) => {
                tracing::debug!(resource = %resource.id, "no datastore table: {}", err);
                Ok(ResourcePreview {
                    resource,
                    datastore: None,
                    note: Some(format!("DataStore not available for this resource ({})", err)),
                })
            }
            Err(err) => Err(err),
        }
    }
}
