use async_trait::async_trait;
use tracing::info;

use crate::gateway::{GenerationError, GenerationGateway};
use crate::models::{
    ApiEndpoint, Column, ColorPalette, ForeignKey, HttpMethod, Page, PagePlan, ProjectInput, Relationship,
    SchemaModification, StylingPlan, Table,
};

/// Offline gateway used when no Gemini key is configured. Returns small, deterministic plans so the
/// whole wizard can be walked through without network access.
#[derive(Debug, Default, Clone)]
pub struct DemoGateway;

fn page(name: &str, purpose: &str, components: &[&str]) -> Page {
    Page {
        name: name.to_string(),
        purpose: purpose.to_string(),
        components: components.iter().map(|c| c.to_string()).collect(),
    }
}

fn api(name: &str, endpoint: &str, method: HttpMethod) -> ApiEndpoint {
    ApiEndpoint { name: name.to_string(), endpoint: endpoint.to_string(), method }
}

fn column(name: &str, data_type: &str, primary_key: bool) -> Column {
    Column { name: name.to_string(), data_type: data_type.to_string(), primary_key, foreign_key: None }
}

#[async_trait]
impl GenerationGateway for DemoGateway {
    async fn generate_single_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError> {
        info!("Using demo mode - single page plan for '{}'", input.purpose);
        Ok(PagePlan { pages: vec![page("Home", &input.purpose, &["Header", "MainContent", "Footer"])] })
    }

    async fn generate_multiple_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError> {
        info!("Using demo mode - multi page plan for '{}'", input.purpose);
        Ok(PagePlan {
            pages: vec![
                page("Home", &input.purpose, &["Header", "Hero", "Footer"]),
                page("Dashboard", "Overview of the user's data", &["Sidebar", "StatsGrid"]),
                page("Settings", "Account and preference management", &["ProfileForm"]),
            ],
        })
    }

    async fn generate_styling_plan(&self, input: &ProjectInput) -> Result<StylingPlan, GenerationError> {
        info!("Using demo mode - styling plan for colors '{}'", input.colors);
        // Shift the palette when asked for variety so regenerate visibly changes something.
        let colors: ColorPalette = if input.colors.contains("shades") {
            [("primary", "#2563EB"), ("secondary", "#7C3AED"), ("background", "#F8FAFC"), ("text", "#0F172A")]
                .into_iter()
                .collect()
        } else {
            [("primary", "#3B82F6"), ("secondary", "#8B5CF6"), ("background", "#FFFFFF"), ("text", "#111827")]
                .into_iter()
                .collect()
        };
        Ok(StylingPlan { colors })
    }

    async fn generate_api_plan(&self, description: &str) -> Result<Vec<ApiEndpoint>, GenerationError> {
        info!("Using demo mode - api plan ({} chars of context)", description.len());
        Ok(vec![
            api("List items", "/api/items", HttpMethod::Get),
            api("Create item", "/api/items", HttpMethod::Post),
            api("Update item", "/api/items/:id", HttpMethod::Put),
            api("Delete item", "/api/items/:id", HttpMethod::Delete),
        ])
    }

    async fn generate_schema(&self, description: &str) -> Result<Vec<Table>, GenerationError> {
        info!("Using demo mode - schema ({} chars of context)", description.len());
        let mut owner = column("user_id", "uuid", false);
        owner.foreign_key = Some(ForeignKey { table: "users".into(), column: "id".into() });
        Ok(vec![
            Table {
                table_name: "users".into(),
                columns: vec![column("id", "uuid", true), column("email", "text", false)],
                relationships: Vec::new(),
            },
            Table {
                table_name: "items".into(),
                columns: vec![column("id", "uuid", true), column("title", "text", false), owner],
                relationships: vec![Relationship { related_table: "users".into() }],
            },
        ])
    }

    async fn modify_schema(&self, schema: &[Table], instruction: &str) -> Result<SchemaModification, GenerationError> {
        info!("Using demo mode - schema modification: {}", instruction);
        let mut database_schema = schema.to_vec();
        for table in &mut database_schema {
            if !table.columns.iter().any(|c| c.name == "created_at") {
                table.columns.push(column("created_at", "timestamp", false));
            }
        }
        Ok(SchemaModification { database_schema })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_schema_relationships_resolve() {
        let tables = DemoGateway.generate_schema("Purpose: demo").await.unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.table_name.as_str()).collect();
        for table in &tables {
            for rel in &table.relationships {
                assert!(names.contains(&rel.related_table.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn demo_styling_varies_on_request() {
        let mut input = ProjectInput::default();
        let plain = DemoGateway.generate_styling_plan(&input).await.unwrap();
        input.colors = "blue Try different shades".into();
        let varied = DemoGateway.generate_styling_plan(&input).await.unwrap();
        assert_ne!(plain, varied);
    }
}
