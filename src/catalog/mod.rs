mod mcp;
mod openapi;
mod risk;
mod store;

pub use mcp::{McpToolListing, parse_mcp_tools};
pub use openapi::parse_openapi;
pub use risk::classify;
pub use store::CatalogStore;
