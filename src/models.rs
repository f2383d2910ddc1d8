use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Seed data collected from the user before the wizard starts.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    #[serde(default)]
    pub app_type: AppType,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub colors: String,
    /// Free-form form fields (target audience, logo name, ...) carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProjectInput {
    /// Sets a form field by its wire name. Unknown names land in `extra`.
    pub fn set_field(&mut self, field: &str, value: String) {
        match field {
            "appType" => self.app_type = AppType::from(value),
            "purpose" => self.purpose = value,
            "colors" => self.colors = value,
            other => {
                self.extra.insert(other.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

/// `single` selects the single-page generator; any other value means multi-page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum AppType {
    Single,
    #[default]
    MultiPage,
    /// Any other label the form sent; generated as multi-page but echoed back verbatim.
    Other(String),
}

impl AppType {
    pub fn is_single_page(&self) -> bool {
        matches!(self, AppType::Single)
    }
}

impl From<String> for AppType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "single" => AppType::Single,
            "multi-page" | "multiple" => AppType::MultiPage,
            _ => AppType::Other(value),
        }
    }
}

impl From<AppType> for String {
    fn from(value: AppType) -> Self {
        match value {
            AppType::Single => "single".to_string(),
            AppType::MultiPage => "multi-page".to_string(),
            AppType::Other(label) => label,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Page {
    pub name: String,
    pub purpose: String,
    #[serde(default)]
    pub components: Vec<String>,
}

/// What the page-plan generators return.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PagePlan {
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ApiEndpoint {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub method: HttpMethod,
}

/// Color roles in the order the generator produced them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColorPalette(Vec<(String, String)>);

impl ColorPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.0.iter().find(|(r, _)| r == role).map(|(_, v)| v.as_str())
    }

    /// Replaces the value of an existing role in place, or appends a new role at the end.
    pub fn upsert(&mut self, role: &str, value: String) {
        match self.0.iter_mut().find(|(r, _)| r == role) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((role.to_string(), value)),
        }
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(r, _)| r.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(r, v)| (r.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<R: Into<String>, V: Into<String>> FromIterator<(R, V)> for ColorPalette {
    fn from_iter<I: IntoIterator<Item = (R, V)>>(iter: I) -> Self {
        let mut palette = ColorPalette::new();
        for (role, value) in iter {
            let role: String = role.into();
            palette.upsert(&role, value.into());
        }
        palette
    }
}

impl Serialize for ColorPalette {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (role, value) in &self.0 {
            map.serialize_entry(role, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColorPalette {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PaletteVisitor;

        impl<'de> Visitor<'de> for PaletteVisitor {
            type Value = ColorPalette;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of color role to color value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut palette = ColorPalette::new();
                while let Some((role, value)) = access.next_entry::<String, String>()? {
                    palette.upsert(&role, value);
                }
                Ok(palette)
            }
        }

        deserializer.deserialize_map(PaletteVisitor)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct StylingPlan {
    #[serde(default)]
    pub colors: ColorPalette,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

/// Soft reference to another table, resolved by name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub related_table: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// What the schema-modification call returns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModification {
    #[serde(default)]
    pub database_schema: Vec<Table>,
}

/// The combined blueprint handed to the caller on save.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    #[serde(flatten)]
    pub input: ProjectInput,
    pub pages: Vec<Page>,
    pub styling: Option<StylingPlan>,
    pub apis: Option<Vec<ApiEndpoint>>,
    pub database_schema: Option<Vec<Table>>,
}
