//! The editable blueprint draft and the local edit operations over it.
//!
//! Every operation here is synchronous and never talks to the generation service. Index-based
//! operations are bounds-checked and report `false` instead of failing when the index is stale.

use serde::{Deserialize, Serialize};

use crate::models::{ApiEndpoint, HttpMethod, Page, ProjectInput, SavePayload, StylingPlan, Table};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DraftDocument {
    pub pages: Vec<Page>,
    pub styling: Option<StylingPlan>,
    pub apis: Option<Vec<ApiEndpoint>>,
    pub database_schema: Option<Vec<Table>>,
}

/// The field of the draft a generation step owns.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DraftField {
    Pages,
    Styling,
    Apis,
    DatabaseSchema,
}

/// A generation result tagged with the field it replaces.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum DraftPatch {
    Pages(Vec<Page>),
    Styling(StylingPlan),
    Apis(Vec<ApiEndpoint>),
    DatabaseSchema(Vec<Table>),
}

impl DraftPatch {
    pub fn field(&self) -> DraftField {
        match self {
            DraftPatch::Pages(_) => DraftField::Pages,
            DraftPatch::Styling(_) => DraftField::Styling,
            DraftPatch::Apis(_) => DraftField::Apis,
            DraftPatch::DatabaseSchema(_) => DraftField::DatabaseSchema,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PageEdit {
    Name(String),
    Purpose(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ApiEdit {
    Name(String),
    Endpoint(String),
    Method(HttpMethod),
}

/// A drawable link between two tables whose relationship resolved by name.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Connector {
    pub from: usize,
    pub to: usize,
}

impl DraftDocument {
    /// Merges a generation result. The page plan is the root of the draft, so a pages patch starts
    /// a fresh document; every other patch replaces only its own field.
    pub fn apply(&mut self, patch: DraftPatch) {
        match patch {
            DraftPatch::Pages(pages) => *self = DraftDocument { pages, ..Default::default() },
            DraftPatch::Styling(styling) => self.styling = Some(styling),
            DraftPatch::Apis(apis) => self.apis = Some(apis),
            DraftPatch::DatabaseSchema(tables) => self.database_schema = Some(tables),
        }
    }

    pub fn edit_page(&mut self, page_index: usize, edit: PageEdit) -> bool {
        let Some(page) = self.pages.get_mut(page_index) else { return false };
        match edit {
            PageEdit::Name(name) => page.name = name,
            PageEdit::Purpose(purpose) => page.purpose = purpose,
        }
        true
    }

    pub fn edit_component(&mut self, page_index: usize, component_index: usize, value: String) -> bool {
        match self.component_mut(page_index, component_index) {
            Some(component) => {
                *component = value;
                true
            }
            None => false,
        }
    }

    pub fn delete_component(&mut self, page_index: usize, component_index: usize) -> bool {
        let Some(page) = self.pages.get_mut(page_index) else { return false };
        if component_index >= page.components.len() {
            return false;
        }
        page.components.remove(component_index);
        true
    }

    /// Appends without validating `text`; empty components are allowed.
    pub fn add_component(&mut self, page_index: usize, text: String) -> bool {
        let Some(page) = self.pages.get_mut(page_index) else { return false };
        page.components.push(text);
        true
    }

    /// Moves a component within its page. `to == None` is a drop outside any target.
    pub fn reorder_components(&mut self, page_index: usize, from: usize, to: Option<usize>) -> bool {
        let Some(to) = to else { return false };
        let Some(page) = self.pages.get_mut(page_index) else { return false };
        let len = page.components.len();
        if from >= len || to >= len {
            return false;
        }
        let moved = page.components.remove(from);
        page.components.insert(to, moved);
        true
    }

    /// Appends a page only when both fields are non-blank.
    pub fn add_page(&mut self, name: &str, purpose: &str) -> bool {
        if name.trim().is_empty() || purpose.trim().is_empty() {
            return false;
        }
        self.pages.push(Page { name: name.to_string(), purpose: purpose.to_string(), components: Vec::new() });
        true
    }

    pub fn delete_page(&mut self, page_index: usize) -> bool {
        if page_index >= self.pages.len() {
            return false;
        }
        self.pages.remove(page_index);
        true
    }

    /// Upserts a color role. Nothing to edit until a styling plan has been generated.
    pub fn edit_color(&mut self, role: &str, value: String) -> bool {
        let Some(styling) = self.styling.as_mut() else { return false };
        styling.colors.upsert(role, value);
        true
    }

    pub fn edit_api(&mut self, index: usize, edit: ApiEdit) -> bool {
        let Some(api) = self.apis.as_mut().and_then(|apis| apis.get_mut(index)) else { return false };
        match edit {
            ApiEdit::Name(name) => api.name = name,
            ApiEdit::Endpoint(endpoint) => api.endpoint = endpoint,
            ApiEdit::Method(method) => api.method = method,
        }
        true
    }

    pub fn delete_api(&mut self, index: usize) -> bool {
        match self.apis.as_mut() {
            Some(apis) if index < apis.len() => {
                apis.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Appends without validating the entry's fields.
    pub fn add_api(&mut self, entry: ApiEndpoint) {
        self.apis.get_or_insert_with(Vec::new).push(entry);
    }

    pub fn api_count(&self) -> usize {
        self.apis.as_ref().map_or(0, Vec::len)
    }

    /// Looks a table up by name; renamed or deleted targets simply miss.
    pub fn resolve_table(&self, table_name: &str) -> Option<usize> {
        self.database_schema.as_ref()?.iter().position(|t| t.table_name == table_name)
    }

    /// Every relationship that resolves to an existing table. Dangling references draw nothing.
    pub fn connectors(&self) -> Vec<Connector> {
        let Some(tables) = self.database_schema.as_ref() else { return Vec::new() };
        tables
            .iter()
            .enumerate()
            .flat_map(|(from, table)| {
                table
                    .relationships
                    .iter()
                    .filter_map(move |rel| self.resolve_table(&rel.related_table).map(|to| Connector { from, to }))
            })
            .collect()
    }

    pub fn save_payload(&self, input: &ProjectInput) -> SavePayload {
        SavePayload {
            input: input.clone(),
            pages: self.pages.clone(),
            styling: self.styling.clone(),
            apis: self.apis.clone(),
            database_schema: self.database_schema.clone(),
        }
    }

    fn component_mut(&mut self, page_index: usize, component_index: usize) -> Option<&mut String> {
        self.pages.get_mut(page_index)?.components.get_mut(component_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColorPalette, Relationship};
    use pretty_assertions::assert_eq;

    fn page(name: &str, components: &[&str]) -> Page {
        Page {
            name: name.into(),
            purpose: format!("{name} purpose"),
            components: components.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn sample() -> DraftDocument {
        DraftDocument {
            pages: vec![page("Home", &["Hero", "Features", "Footer"]), page("About", &["Bio", "Team"])],
            ..Default::default()
        }
    }

    fn table(name: &str, related: &[&str]) -> Table {
        Table {
            table_name: name.into(),
            columns: Vec::new(),
            relationships: related.iter().map(|r| Relationship { related_table: r.to_string() }).collect(),
        }
    }

    #[test]
    fn delete_component_removes_exactly_one() {
        let mut draft = sample();
        let other_before = draft.pages[1].components.clone();
        assert!(draft.delete_component(0, 1));
        assert_eq!(draft.pages[0].components, vec!["Hero", "Footer"]);
        assert_eq!(draft.pages[1].components, other_before);
    }

    #[test]
    fn out_of_range_indices_are_silent_no_ops() {
        let mut draft = sample();
        let before = draft.clone();
        assert!(!draft.delete_component(0, 9));
        assert!(!draft.delete_component(7, 0));
        assert!(!draft.edit_component(2, 0, "x".into()));
        assert!(!draft.edit_page(5, PageEdit::Name("x".into())));
        assert!(!draft.delete_page(2));
        assert!(!draft.add_component(3, "x".into()));
        assert!(!draft.edit_api(0, ApiEdit::Name("x".into())));
        assert!(!draft.delete_api(0));
        assert_eq!(draft, before);
    }

    #[test]
    fn reorder_then_reverse_restores_sequence() {
        let mut draft = sample();
        let original = draft.pages[0].components.clone();
        assert!(draft.reorder_components(0, 0, Some(2)));
        assert_eq!(draft.pages[0].components, vec!["Features", "Footer", "Hero"]);
        assert!(draft.reorder_components(0, 2, Some(0)));
        assert_eq!(draft.pages[0].components, original);
    }

    #[test]
    fn reorder_dropped_outside_target_is_no_op() {
        let mut draft = sample();
        assert!(!draft.reorder_components(0, 1, None));
        assert!(!draft.reorder_components(0, 1, Some(3)));
        assert_eq!(draft.pages[0].components, vec!["Hero", "Features", "Footer"]);
    }

    #[test]
    fn add_page_requires_both_fields() {
        let mut draft = DraftDocument::default();
        assert!(!draft.add_page("", "x"));
        assert!(!draft.add_page("x", ""));
        assert!(!draft.add_page("", ""));
        assert!(!draft.add_page("   ", "x"));
        assert!(draft.pages.is_empty());

        assert!(draft.add_page("Home", "Landing page"));
        assert_eq!(draft.pages, vec![Page { name: "Home".into(), purpose: "Landing page".into(), components: vec![] }]);
    }

    #[test]
    fn add_component_accepts_empty_text() {
        let mut draft = sample();
        assert!(draft.add_component(1, String::new()));
        assert_eq!(draft.pages[1].components, vec!["Bio", "Team", ""]);
    }

    #[test]
    fn add_api_does_not_validate() {
        let mut draft = DraftDocument::default();
        draft.add_api(ApiEndpoint { name: "List".into(), endpoint: "/items".into(), method: HttpMethod::Get });
        draft.add_api(ApiEndpoint::default());
        assert_eq!(draft.api_count(), 2);
        assert_eq!(draft.apis.as_ref().unwrap()[1].name, "");
    }

    #[test]
    fn edit_api_fields() {
        let mut draft = DraftDocument { apis: Some(vec![ApiEndpoint::default()]), ..Default::default() };
        assert!(draft.edit_api(0, ApiEdit::Endpoint("/users".into())));
        assert!(draft.edit_api(0, ApiEdit::Method(HttpMethod::Delete)));
        let api = &draft.apis.as_ref().unwrap()[0];
        assert_eq!(api.endpoint, "/users");
        assert_eq!(api.method, HttpMethod::Delete);
    }

    #[test]
    fn edit_color_needs_a_styling_plan() {
        let mut draft = DraftDocument::default();
        assert!(!draft.edit_color("primary", "#000".into()));

        draft.apply(DraftPatch::Styling(StylingPlan { colors: [("primary", "#ff0000")].into_iter().collect() }));
        assert!(draft.edit_color("primary", "#00ff00".into()));
        let expected: ColorPalette = [("primary", "#00ff00")].into_iter().collect();
        assert_eq!(draft.styling.unwrap().colors, expected);
    }

    #[test]
    fn patches_only_touch_their_own_field() {
        let mut draft = sample();
        draft.apply(DraftPatch::Styling(StylingPlan::default()));
        draft.apply(DraftPatch::Apis(vec![ApiEndpoint::default()]));
        assert_eq!(draft.pages, sample().pages);

        draft.apply(DraftPatch::DatabaseSchema(vec![table("users", &[])]));
        assert_eq!(draft.api_count(), 1);
        assert!(draft.styling.is_some());
    }

    #[test]
    fn pages_patch_starts_a_fresh_document() {
        let mut draft = sample();
        draft.apply(DraftPatch::Apis(vec![ApiEndpoint::default()]));
        draft.apply(DraftPatch::Pages(vec![page("Only", &[])]));
        assert_eq!(draft, DraftDocument { pages: vec![page("Only", &[])], ..Default::default() });
    }

    #[test]
    fn dangling_relationship_draws_no_connector() {
        let mut draft = DraftDocument::default();
        draft.apply(DraftPatch::DatabaseSchema(vec![
            table("users", &[]),
            table("todos", &["users", "projects"]),
        ]));
        assert_eq!(draft.resolve_table("projects"), None);
        assert_eq!(draft.connectors(), vec![Connector { from: 1, to: 0 }]);

        draft.database_schema.as_mut().unwrap()[0].table_name = "accounts".into();
        assert!(draft.connectors().is_empty());
    }

    #[test]
    fn save_payload_flattens_input() {
        let mut input = ProjectInput::default();
        input.set_field("purpose", "todo app".into());
        let payload = sample().save_payload(&input);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["purpose"], "todo app");
        assert_eq!(json["pages"].as_array().unwrap().len(), 2);
        assert!(json["databaseSchema"].is_null());
    }
}
