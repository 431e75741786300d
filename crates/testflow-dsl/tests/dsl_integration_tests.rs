use testflow_dsl::{
    leaf_actions, parse_and_validate_flow_document, parse_flow_document, resolve, validate_for_save,
    validation::error_codes, Catalog, DslError, ElementId, FlowDocument, Step, TestCaseId,
};

// Helper function to check that a collected error carries a code
fn error_contains(err: &DslError, expected_code: &str) -> bool {
    err.validation_errors().iter().any(|e| e.code == expected_code)
}

const CATALOG_YAML: &str = r##"
pages:
  - { id: 1, name: Login }
elements:
  - { id: 5, page_id: 1, name: Login Button, tipo: button, estrategia: css, valor: "#login" }
  - { id: 6, page_id: 1, name: User Field, tipo: input, estrategia: id, valor: user }
actions:
  - { id: 9, name: Click, tipo: mouse, codigo: "click({selector})", argumentos: selector }
  - { id: 10, name: Type, tipo: keyboard, codigo: "type({selector}, {text})", argumentos: "selector, text" }
"##;

fn catalog() -> Catalog {
    Catalog::from_yaml_str(CATALOG_YAML).unwrap()
}

#[test]
fn test_parse_and_validate_nested_flow() {
    let yaml = r##"
    dsl_version: "1.0"
    test_id: 12
    globals: "base_url = 'http://app'"
    steps:
      - kind: action
        id: type-user
        element_ref: 6
        action_ref: 10
        parameters:
          selector: "#user"
          text: alice
      - kind: if
        id: check
        condition: "page.has('#login')"
        then_branch:
          - kind: loop
            id: retry
            repeat_count: 3
            body:
              - kind: action
                id: click-login
                element_ref: 5
                action_ref: 9
                parameters:
                  selector: "#login"
        else_branch: []
    "##;

    let result = parse_and_validate_flow_document(yaml, &catalog());
    assert!(result.is_ok(), "Failed to validate nested flow: {:?}", result.err());

    let document = result.unwrap();
    let actions = leaf_actions(&document.steps);
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1].id.0, "click-login");

    let click = catalog();
    let template = click.action(actions[1].action_ref.unwrap()).unwrap();
    assert_eq!(resolve(&template.code, &actions[1].parameters), "click(#login)");
}

#[test]
fn test_all_violations_are_collected() {
    let yaml = r#"
    dsl_version: "1.0"
    steps:
      - kind: action
        element_ref: 5
      - kind: if
        condition: ""
        else_branch:
          - kind: action
            element_ref: 99
            action_ref: 9
            parameters:
              selector: x
      - kind: loop
        repeat_count: 0
        body:
          - kind: action
            element_ref: 6
            action_ref: 10
            parameters:
              selector: x
    "#;

    let err = parse_and_validate_flow_document(yaml, &catalog()).unwrap_err();
    assert!(matches!(err, DslError::MultipleValidationErrors(_)));
    assert_eq!(err.validation_errors().len(), 5);

    assert!(error_contains(&err, error_codes::MISSING_ACTION));
    assert!(error_contains(&err, error_codes::EMPTY_CONDITION));
    assert!(error_contains(&err, error_codes::UNKNOWN_ELEMENT));
    assert!(error_contains(&err, error_codes::INVALID_REPEAT_COUNT));
    assert!(error_contains(&err, error_codes::PARAMETER_MISMATCH));
}

#[test]
fn test_document_round_trips_through_yaml_and_json() {
    let mut loop_step = Step::new_loop();
    if let Step::Loop(l) = &mut loop_step {
        l.repeat_count = 2;
        l.body.push(Step::new_action(ElementId(5)));
    }
    let document = FlowDocument::new(Some(TestCaseId(3)), vec![loop_step]);

    let yaml = document.to_yaml().unwrap();
    assert_eq!(parse_flow_document(&yaml).unwrap(), document);

    let json = document.to_json().unwrap();
    assert_eq!(testflow_dsl::parse_flow_document_json(&json).unwrap(), document);
}

#[test]
fn test_unconfigured_tree_is_not_savable() {
    let steps = vec![Step::new_action(ElementId(5))];
    let errors = validate_for_save(&steps, &catalog());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, error_codes::MISSING_ACTION);
}
