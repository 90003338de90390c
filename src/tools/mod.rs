//! Assistant tool capabilities.
//!
//! The tool set is closed: three named capabilities the model may invoke
//! mid-generation, expressed as a tagged variant per kind and dispatched
//! through one exhaustive match. Tool failures never escape into the
//! gateway — every failure collapses to a "no result" outcome the model can
//! read and recover from.

pub mod browse;
pub mod catalog;
pub mod directory;

pub use browse::{HttpFetcher, PageFetcher};
pub use catalog::{InMemoryCatalog, ProductCatalog, ProductSummary};
pub use directory::{InMemoryDirectory, UserDirectory, UserProfile};

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// A tool call as it arrives on the wire: a name plus raw JSON arguments.
#[derive(Debug, Clone)]
pub struct WireToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

/// Typed input for one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    FindUser { name: String },
    FindProduct { query: String },
    Browse { url: String },
}

#[derive(Deserialize)]
struct FindUserArgs {
    name: String,
}

#[derive(Deserialize)]
struct FindProductArgs {
    query: String,
}

#[derive(Deserialize)]
struct BrowseArgs {
    url: String,
}

impl ToolInvocation {
    /// Parse a wire call into a typed invocation. `None` for unknown tools
    /// or malformed arguments — the caller turns that into a no-result.
    pub fn parse(call: &WireToolCall) -> Option<Self> {
        match call.name.as_str() {
            "find_user" => {
                let args: FindUserArgs = serde_json::from_str(&call.arguments).ok()?;
                Some(Self::FindUser { name: args.name })
            }
            "find_product" => {
                let args: FindProductArgs = serde_json::from_str(&call.arguments).ok()?;
                Some(Self::FindProduct { query: args.query })
            }
            "browse" => {
                let args: BrowseArgs = serde_json::from_str(&call.arguments).ok()?;
                Some(Self::Browse { url: args.url })
            }
            _ => None,
        }
    }
}

/// Typed result of one tool invocation, spliced back into the generation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// `find_user` — a profile, or null for no match (never an error).
    User(Option<UserProfile>),
    /// `find_product` — zero or more matching summaries.
    Products(Vec<ProductSummary>),
    /// `browse` — the page's text content.
    Page(String),
    /// Any tool-level failure, rendered as a readable no-result signal.
    NoResult(String),
}

impl ToolOutcome {
    /// Serialize for the tool-role message fed back to the model.
    pub fn to_json(&self) -> Value {
        match self {
            Self::User(Some(profile)) => json!({ "user": profile }),
            Self::User(None) => json!({ "user": null }),
            Self::Products(items) => json!({ "products": items }),
            Self::Page(text) => json!({ "content": text }),
            Self::NoResult(reason) => json!({ "result": null, "reason": reason }),
        }
    }
}

/// Descriptor handed to the model so it can decide when to invoke a tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// The assistant's capability set with its backing collaborators.
pub struct Toolbox {
    directory: Arc<dyn UserDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    fetcher: Arc<dyn PageFetcher>,
}

impl Toolbox {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            directory,
            catalog,
            fetcher,
        }
    }

    /// Descriptors for all capabilities, in a fixed order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "find_user",
                description: "Look up a user profile by exact name (case-insensitive). \
                              Returns the profile or null if no user matches.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "The user's name" }
                    },
                    "required": ["name"]
                }),
            },
            ToolDescriptor {
                name: "find_product",
                description: "Search the product catalog. Matches the query as a \
                              case-insensitive substring of the product name or \
                              description. Returns an array, possibly empty.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search text" }
                    },
                    "required": ["query"]
                }),
            },
            ToolDescriptor {
                name: "browse",
                description: "Fetch a web page and return its text content for reading.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Absolute URL to fetch" }
                    },
                    "required": ["url"]
                }),
            },
        ]
    }

    /// Execute one wire tool call to completion.
    pub async fn dispatch(&self, call: &WireToolCall) -> ToolOutcome {
        let invocation = match ToolInvocation::parse(call) {
            Some(inv) => inv,
            None => {
                warn!(tool = %call.name, "Unparseable tool call");
                return ToolOutcome::NoResult(format!(
                    "Unknown tool or malformed arguments for '{}'",
                    call.name
                ));
            }
        };

        debug!(tool = %call.name, "Dispatching tool call");
        match invocation {
            ToolInvocation::FindUser { name } => {
                ToolOutcome::User(self.directory.find_user(&name).await)
            }
            ToolInvocation::FindProduct { query } => {
                ToolOutcome::Products(self.catalog.find_products(&query).await)
            }
            ToolInvocation::Browse { url } => match self.fetcher.fetch(&url).await {
                Ok(text) => ToolOutcome::Page(text),
                Err(reason) => {
                    warn!(url = %url, reason = %reason, "Page fetch failed");
                    ToolOutcome::NoResult(format!("Could not fetch {url}: {reason}"))
                }
            },
        }
    }
}
