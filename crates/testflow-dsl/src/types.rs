use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                $name(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Backend identifier of a page
    PageId
);
numeric_id!(
    /// Backend identifier of a page element
    ElementId
);
numeric_id!(
    /// Backend identifier of an action template
    ActionId
);
numeric_id!(
    /// Backend identifier of a test case
    TestCaseId
);
numeric_id!(
    /// Backend identifier of a persisted element-action assignment
    AssignmentId
);

/// Identifier of a step in a flow tree.
///
/// Generated when the step is created; it is not a persisted identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    /// Generate a fresh step id
    pub fn generate() -> Self {
        StepId(Uuid::new_v4().to_string())
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        StepId(s)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        StepId(s.to_string())
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = StepId::generate();
        let b = StepId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_numeric_ids_serialize_transparently() {
        let json = serde_json::to_string(&ElementId(5)).unwrap();
        assert_eq!(json, "5");
        let id: ActionId = serde_json::from_str("9").unwrap();
        assert_eq!(id, ActionId(9));
    }
}
