//! Code previews for action steps and whole flows

use testflow_dsl::template::{resolve_with_report, Resolution};
use testflow_dsl::{leaf_actions, ActionStep, Catalog, Step};

/// Header line of a generated script
pub const SCRIPT_HEADER: &str = "# Auto generated script";

/// Resolve the step's action code with its parameters.
///
/// `None` when no action is bound or the action is not in the catalog.
pub fn preview_step(step: &ActionStep, catalog: &Catalog) -> Option<Resolution> {
    let template = catalog.action(step.action_ref?)?;
    Some(resolve_with_report(&template.code, &step.parameters))
}

/// Render the script the executor would receive for `steps`.
///
/// One block per action step, depth-first: a `# <action> -> <element>`
/// comment, a `# params: {...}` comment when parameters are set, then the
/// resolved code. Unbound steps are skipped.
pub fn script_preview(steps: &[Step], catalog: &Catalog) -> String {
    let mut lines = vec![SCRIPT_HEADER.to_string()];

    for step in leaf_actions(steps) {
        let Some(template) = step.action_ref.and_then(|id| catalog.action(id)) else {
            continue;
        };
        let element = catalog
            .element(step.element_ref)
            .map(|e| e.name.as_str())
            .unwrap_or("?");

        lines.push(format!("# {} -> {}", template.name, element));
        if !step.parameters.is_empty() {
            let params = serde_json::to_string(&step.parameters).unwrap_or_default();
            lines.push(format!("# params: {}", params));
        }
        lines.push(testflow_dsl::resolve(&template.code, &step.parameters));
    }

    lines.join("\n")
}
