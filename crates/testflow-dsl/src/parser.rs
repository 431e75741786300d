use crate::error::DslError;
use crate::flow::{FlowDocument, CURRENT_DSL_VERSION};

/// Parse a YAML string into a FlowDocument.
///
/// This function handles the initial conversion from YAML text to structured data.
/// It does not check catalog references or save-time rules - that's handled
/// separately by the validation module.
pub fn parse_flow_document(yaml_str: &str) -> Result<FlowDocument, DslError> {
    let document: FlowDocument = serde_yaml::from_str(yaml_str)?;
    check_version(document)
}

/// Parse a JSON string into a FlowDocument.
pub fn parse_flow_document_json(json_str: &str) -> Result<FlowDocument, DslError> {
    let document: FlowDocument = serde_json::from_str(json_str)?;
    check_version(document)
}

fn check_version(document: FlowDocument) -> Result<FlowDocument, DslError> {
    if document.dsl_version != CURRENT_DSL_VERSION {
        return Err(DslError::UnsupportedVersion(document.dsl_version));
    }

    tracing::debug!(
        steps = document.steps.len(),
        test_id = ?document.test_id,
        "Parsed flow document"
    );

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Step;

    #[test]
    fn test_parse_minimal_valid_document() {
        let yaml = r#"
        dsl_version: "1.0"
        steps: []
        "#;

        let result = parse_flow_document(yaml);
        assert!(result.is_ok(), "Failed to parse valid document: {:?}", result.err());

        let doc = result.unwrap();
        assert_eq!(doc.dsl_version, "1.0");
        assert!(doc.steps.is_empty());
        assert!(doc.test_id.is_none());
    }

    #[test]
    fn test_parse_nested_document() {
        let yaml = r##"
        dsl_version: "1.0"
        test_id: 3
        steps:
          - kind: action
            id: first
            element_ref: 5
            action_ref: 9
            parameters:
              selector: "#login"
          - kind: if
            id: branch
            condition: "logged_in"
            then_branch:
              - kind: loop
                id: repeat
                repeat_count: 3
                body:
                  - kind: action
                    id: inner
                    element_ref: 6
        "##;

        let doc = parse_flow_document(yaml).unwrap();
        assert_eq!(doc.steps.len(), 2);
        match &doc.steps[1] {
            Step::If(branch) => {
                assert_eq!(branch.condition, "logged_in");
                assert_eq!(branch.then_branch.len(), 1);
                assert!(branch.else_branch.is_empty());
            }
            other => panic!("Expected If step, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_yaml_syntax() {
        let yaml = r#"
        dsl_version: "1.0"
        steps: [
          - kind: action
        "#;

        match parse_flow_document(yaml).err().unwrap() {
            DslError::YamlError(_) => {}
            err => panic!("Expected YamlError, got {:?}", err),
        }
    }

    #[test]
    fn test_unsupported_dsl_version() {
        let json = r#"{"dsl_version": "2.0", "steps": []}"#;

        match parse_flow_document_json(json).err().unwrap() {
            DslError::UnsupportedVersion(version) => assert_eq!(version, "2.0"),
            err => panic!("Expected UnsupportedVersion, got {:?}", err),
        }
    }
}
