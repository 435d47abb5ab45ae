//! Model Context Protocol server
//!
//! Exposes every [`Command`] as an MCP tool named `ckan_<command>` and three
//! read-only documentation resources. The JSON-RPC framing and the
//! `initialize` handshake are handled by `rmcp`; this module only maps
//! requests onto the [`Dispatcher`].
//!
//! A tool that runs but fails answers with `isError: true` and the
//! [`ToolResponse`](super::ToolResponse) envelope as text, so
//! the agent sees the error kind. Only a tool name nobody knows is a
//! protocol-level error.

use rmcp::model::{
    AnnotateAble, CallToolRequestParam, CallToolResult, Content, ErrorData as McpError,
    Implementation, JsonObject, ListResourcesResult, ListToolsResult, PaginatedRequestParam,
    ProtocolVersion, RawResource, ReadResourceRequestParam, ReadResourceResult, Resource,
    ResourceContents, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{Command, Dispatcher, TOOL_PREFIX};
use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorKind};

pub const API_DOCS_URI: &str = "ckan://api/docs";
pub const CONFIG_URI: &str = "ckan://config";
pub const FEATURES_URI: &str = "ckan://enhanced/features";

const INSTRUCTIONS: &str = "Read-only access to a CKAN open-data portal. \
Start with ckan_package_search or ckan_faceted_search to find datasets, then \
ckan_package_show for details and ckan_resource_preview for the data itself. \
Read ckan://enhanced/features for the analysis tools.";

/// Handler shared by every MCP session
#[derive(Debug, Clone)]
pub struct CatalogServer {
    dispatcher: Dispatcher,
    config: ClientConfig,
}

impl CatalogServer {
    /// `config` is what the client was built from; it is only reported
    /// through the `ckan://config` resource
    pub fn new(dispatcher: Dispatcher, config: ClientConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn tools() -> Vec<Tool> {
        Command::ALL
            .iter()
            .map(|command| {
                let spec = command.spec();
                let schema = match spec.input_schema {
                    Value::Object(map) => map,
                    _ => JsonObject::new(),
                };
                Tool::new(spec.name, spec.description, Arc::new(schema))
            })
            .collect()
    }

    /// Run one tool call. `Err` only for names that are not tools.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = arguments.map(Value::Object).unwrap_or(Value::Null);
        let response = self.dispatcher.invoke(name, arguments).await;

        if let Some(error) = &response.error {
            if error.kind == ErrorKind::UnknownCommand {
                return Err(McpError::invalid_params(error.message.clone(), None));
            }
        }
        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        if response.success {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        }
    }

    pub fn resources() -> Vec<Resource> {
        [
            (
                API_DOCS_URI,
                "CKAN API Documentation",
                "Catalog actions behind the tools",
                "text/plain",
            ),
            (
                CONFIG_URI,
                "CKAN Server Configuration",
                "Portal URL, timeout and the tools on offer",
                "application/json",
            ),
            (
                FEATURES_URI,
                "Enhanced Features Documentation",
                "Search, quality, analytics, preview and export tools",
                "text/plain",
            ),
        ]
        .into_iter()
        .map(|(uri, name, description, mime)| {
            let mut raw = RawResource::new(uri, name);
            raw.description = Some(description.to_string());
            raw.mime_type = Some(mime.to_string());
            raw.no_annotation()
        })
        .collect()
    }

    /// Text of a documentation resource
    pub fn read(&self, uri: &str) -> Result<String, ClientError> {
        match uri {
            API_DOCS_URI => Ok(api_docs(&self.config)),
            CONFIG_URI => serde_json::to_string_pretty(&json!({
                "base_url": self.config.base_url,
                "timeout_secs": self.config.timeout.as_secs(),
                "user_agent": self.config.user_agent,
                "read_only": true,
                "tools": Command::ALL.iter().map(Command::tool_name).collect::<Vec<_>>(),
            }))
            .map_err(|e| ClientError::protocol(e.to_string())),
            FEATURES_URI => Ok(features_doc()),
            other => Err(ClientError::validation(
                "uri",
                format!("unknown resource `{}`", other),
            )),
        }
    }
}

fn api_docs(config: &ClientConfig) -> String {
    let mut doc = format!(
        "CKAN Action API (version 3)\n\nBase URL: {}\nEndpoint form: {}\n\nTools:\n",
        config.base_url,
        config.action_url("<action>")
    );
    for command in Command::ALL {
        doc.push_str(&format!("- {}: {}\n", command.tool_name(), command.description()));
    }
    doc.push_str("\nAll calls are read-only. Full documentation: https://docs.ckan.org/en/latest/api/\n");
    doc
}

fn features_doc() -> String {
    format!(
        "Enhanced tools\n\n\
{p}faceted_search: package search that always returns facet counts (tags, \
organization and res_format unless facet_fields says otherwise). `filters` maps \
field names to a value or a list of values; `date_range` takes ISO-8601 `start` \
and `end` on any date field; `spatial_query` takes `bbox` [min_lon, min_lat, \
max_lon, max_lat] or `point` [lon, lat] with `radius` and needs the portal's \
spatial extension.\n\n\
{p}related_datasets: datasets sharing tags, the organization, or groups (theme) \
with the given one, never the dataset itself.\n\n\
{p}data_quality_check: completeness of title, notes, tags, organization and \
resources; share of resources with a known format and a URL; presence of \
license, author, maintainer, temporal and spatial coverage. Each score is a \
percentage and overall_score is their mean.\n\n\
{p}dataset_analytics: views, recent views and resource count for one dataset \
(views need the portal's tracking), or newest and largest datasets portal-wide \
for dataset_id `all`.\n\n\
{p}resource_preview: resource metadata plus the first DataStore rows and field \
types. Resources outside the DataStore come back with a note instead of rows.\n\n\
{p}metadata_exporter: DCAT or schema.org JSON-LD, or the normalized CKAN record, \
for a list of datasets.\n",
        p = TOOL_PREFIX
    )
}

impl ServerHandler for CatalogServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(Self::tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&request.name, request.arguments).await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(Self::resources()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self
            .read(&request.uri)
            .map_err(|e| McpError::resource_not_found(e.to_string(), None))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}
