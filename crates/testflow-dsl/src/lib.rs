//! # Testflow DSL
//!
//! Data model for composing automated UI test flows. A flow is an ordered
//! tree of steps: action steps bind a catalog element to an action template
//! and its parameters, conditionals hold then/else branches and loops hold a
//! body repeated a fixed number of times.
//!
//! This crate provides:
//!
//! * the reference catalog (pages, elements, action templates)
//! * the step tree model and its YAML/JSON document form
//! * save-time validation that collects every violation at once
//! * `{placeholder}` resolution used to preview generated code
//!
//! ## Example
//!
//! ```
//! use testflow_dsl::{parse_and_validate_flow_document, Catalog};
//!
//! let catalog = Catalog::from_yaml_str(r#"
//! elements:
//!   - { id: 5, page_id: 1, name: Login Button }
//! actions:
//!   - { id: 9, name: Click, code: "click({selector})", arguments: selector }
//! "#).unwrap();
//!
//! let yaml = r##"
//! dsl_version: "1.0"
//! steps:
//!   - kind: action
//!     element_ref: 5
//!     action_ref: 9
//!     parameters:
//!       selector: "#login"
//! "##;
//!
//! let document = parse_and_validate_flow_document(yaml, &catalog).unwrap();
//! assert_eq!(document.steps.len(), 1);
//! ```

mod error;
mod parser;
mod types;

pub mod catalog;
pub mod flow;
pub mod template;
pub mod validation;

pub use catalog::{ActionTemplate, Catalog, Element, Page};
pub use error::DslError;
pub use flow::{
    leaf_actions, ActionStep, FlowDocument, IfStep, LoopStep, ParameterMap, Step, StepKind,
    CURRENT_DSL_VERSION,
};
pub use parser::{parse_flow_document, parse_flow_document_json};
pub use template::{resolve, resolve_with_report, Resolution};
pub use types::{ActionId, AssignmentId, ElementId, PageId, StepId, TestCaseId};
pub use validation::{validate_for_save, ValidationError};

/// Parse a YAML flow document and check it against `catalog`.
///
/// # Errors
///
/// * Invalid YAML syntax
/// * Unsupported DSL version
/// * Save-time violations; all of them are returned, not only the first
///
/// ```
/// use testflow_dsl::{parse_and_validate_flow_document, Catalog, DslError};
///
/// let yaml = r#"
/// dsl_version: "1.0"
/// steps:
///   - kind: loop
///     repeat_count: 0
///   - kind: if
///     condition: ""
/// "#;
///
/// match parse_and_validate_flow_document(yaml, &Catalog::default()) {
///     Err(DslError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 2),
///     other => panic!("unexpected result: {:?}", other),
/// }
/// ```
pub fn parse_and_validate_flow_document(
    yaml_str: &str,
    catalog: &Catalog,
) -> Result<FlowDocument, DslError> {
    let document = parser::parse_flow_document(yaml_str)?;

    validation::validate_document(&document, catalog)?;

    Ok(document)
}

/// Returns the version of the testflow-dsl crate
///
/// ```
/// use testflow_dsl::version;
///
/// assert!(version().starts_with("0."));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
