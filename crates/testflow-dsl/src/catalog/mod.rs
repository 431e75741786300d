//! Reference data the flow builder composes steps from.
//!
//! Pages, elements and action templates are fetched from the backend once
//! per editor session and treated as read-only afterwards.

use serde::{Deserialize, Serialize};

use crate::error::DslError;
use crate::types::{ActionId, ElementId, PageId};

/// A page of the application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Backend identifier
    pub id: PageId,

    /// Display name
    pub name: String,
}

/// A locatable UI target on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Backend identifier
    pub id: ElementId,

    /// Page this element belongs to
    pub page_id: PageId,

    /// Display name (e.g. "Login Button")
    pub name: String,

    /// Element type (button, input, ...)
    #[serde(rename = "type", alias = "tipo", default)]
    pub element_type: String,

    /// Locator strategy (css, xpath, id, ...)
    #[serde(alias = "estrategia", default)]
    pub strategy: String,

    /// Locator value for the strategy
    #[serde(alias = "valor", default)]
    pub value: String,

    /// Optional human-readable description
    #[serde(alias = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A reusable unit of automation code with declared parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTemplate {
    /// Backend identifier
    pub id: ActionId,

    /// Display name (e.g. "Click")
    pub name: String,

    /// Action type
    #[serde(rename = "type", alias = "tipo", default)]
    pub action_type: String,

    /// Code template containing `{name}` placeholders
    #[serde(alias = "codigo", default)]
    pub code: String,

    /// Comma-separated argument declaration (e.g. "selector, text")
    #[serde(alias = "argumentos", default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ActionTemplate {
    /// Declared argument names, in declaration order.
    ///
    /// Parts are trimmed and empty parts are dropped, so `"a, ,b,"` yields
    /// `["a", "b"]`.
    pub fn argument_names(&self) -> Vec<String> {
        match &self.arguments {
            Some(declaration) => declaration
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Check whether `name` is one of the declared arguments
    pub fn declares_argument(&self, name: &str) -> bool {
        self.argument_names().iter().any(|arg| arg == name)
    }
}

/// The full set of reference data available to the builder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Pages
    #[serde(default)]
    pub pages: Vec<Page>,

    /// Page elements
    #[serde(default)]
    pub elements: Vec<Element>,

    /// Action templates
    #[serde(default)]
    pub actions: Vec<ActionTemplate>,
}

impl Catalog {
    /// Build a catalog from its three lists
    pub fn new(pages: Vec<Page>, elements: Vec<Element>, actions: Vec<ActionTemplate>) -> Self {
        Self {
            pages,
            elements,
            actions,
        }
    }

    /// Parse a catalog from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DslError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a catalog from JSON
    pub fn from_json_str(json: &str) -> Result<Self, DslError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Look up a page
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// Look up an element
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Look up an action template
    pub fn action(&self, id: ActionId) -> Option<&ActionTemplate> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Elements shown in the drag source list.
    ///
    /// With no page selected every element is listed.
    pub fn elements_for_page(&self, page: Option<PageId>) -> Vec<&Element> {
        match page {
            Some(page_id) => self.elements.iter().filter(|e| e.page_id == page_id).collect(),
            None => self.elements.iter().collect(),
        }
    }
}
