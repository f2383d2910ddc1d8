//! The generation service seen from the wizard: six fallible calls, one per kind of plan.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ApiEndpoint, PagePlan, ProjectInput, SchemaModification, StylingPlan, Table};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Other: {0}")]
    Other(String),
}

#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate_single_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError>;

    async fn generate_multiple_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError>;

    async fn generate_styling_plan(&self, input: &ProjectInput) -> Result<StylingPlan, GenerationError>;

    async fn generate_api_plan(&self, description: &str) -> Result<Vec<ApiEndpoint>, GenerationError>;

    async fn generate_schema(&self, description: &str) -> Result<Vec<Table>, GenerationError>;

    async fn modify_schema(&self, schema: &[Table], instruction: &str) -> Result<SchemaModification, GenerationError>;
}
