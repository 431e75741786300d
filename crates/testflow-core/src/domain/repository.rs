//! Repository traits for the Testflow core
//!
//! This module defines the backend-facing traits used by the editor and
//! the execution monitor. External crates can implement these traits over
//! an HTTP API; the `memory` module provides in-process implementations.

use async_trait::async_trait;

use testflow_dsl::{ActionTemplate, AssignmentId, Catalog, Element, Page, TestCaseId};

use super::assignment::{Assignment, AssignmentPayload};
use super::execution::{ExecutionId, MonitorCommand};
use crate::CoreError;

/// Source of the catalog reference data
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// List all pages
    async fn fetch_pages(&self) -> Result<Vec<Page>, CoreError>;

    /// List all page elements
    async fn fetch_elements(&self) -> Result<Vec<Element>, CoreError>;

    /// List all action templates
    async fn fetch_actions(&self) -> Result<Vec<ActionTemplate>, CoreError>;
}

/// Fetch pages, elements and actions once for an editor session
pub async fn load_catalog(provider: &dyn CatalogProvider) -> Result<Catalog, CoreError> {
    let (pages, elements, actions) = futures::try_join!(
        provider.fetch_pages(),
        provider.fetch_elements(),
        provider.fetch_actions()
    )?;

    tracing::debug!(
        pages = pages.len(),
        elements = elements.len(),
        actions = actions.len(),
        "Loaded catalog"
    );

    Ok(Catalog::new(pages, elements, actions))
}

/// Persistence of element-action assignments
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Assignments of a test case, in stored order
    async fn list_for_test(&self, test_id: TestCaseId) -> Result<Vec<Assignment>, CoreError>;

    /// Store a new assignment and return it with its identifier
    async fn create(&self, payload: &AssignmentPayload) -> Result<Assignment, CoreError>;

    /// Rewrite an existing assignment
    async fn update(&self, id: AssignmentId, payload: &AssignmentPayload) -> Result<(), CoreError>;

    /// Remove an assignment
    async fn delete(&self, id: AssignmentId) -> Result<(), CoreError>;

    /// Record that the test case's flow has been parameterized
    async fn mark_parameterized(&self, test_id: TestCaseId) -> Result<(), CoreError>;
}

/// Outbound channel for execution commands
#[async_trait]
pub trait ExecutionCommandSink: Send + Sync {
    /// Deliver a command; fire-and-forget from the monitor's point of view
    async fn send(&self, execution_id: ExecutionId, command: MonitorCommand) -> Result<(), CoreError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{Arc, Mutex};

    /// Test status written by [`AssignmentRepository::mark_parameterized`]
    pub const PARAMETERIZED_STATUS: &str = "parametrizado";

    /// Serves a fixed catalog
    pub struct MemoryCatalogProvider {
        catalog: Catalog,
    }

    impl MemoryCatalogProvider {
        /// Create a provider over `catalog`
        pub fn new(catalog: Catalog) -> Self {
            Self { catalog }
        }
    }

    #[async_trait]
    impl CatalogProvider for MemoryCatalogProvider {
        async fn fetch_pages(&self) -> Result<Vec<Page>, CoreError> {
            Ok(self.catalog.pages.clone())
        }

        async fn fetch_elements(&self) -> Result<Vec<Element>, CoreError> {
            Ok(self.catalog.elements.clone())
        }

        async fn fetch_actions(&self) -> Result<Vec<ActionTemplate>, CoreError> {
            Ok(self.catalog.actions.clone())
        }
    }

    /// In-memory assignment store using concurrent maps
    pub struct MemoryAssignmentRepository {
        assignments: Arc<DashMap<AssignmentId, Assignment>>,
        test_status: Arc<DashMap<TestCaseId, String>>,
        next_id: AtomicI64,
    }

    impl MemoryAssignmentRepository {
        /// Create an empty repository
        pub fn new() -> Self {
            Self {
                assignments: Arc::new(DashMap::with_capacity(64)),
                test_status: Arc::new(DashMap::new()),
                next_id: AtomicI64::new(1),
            }
        }

        /// Create a repository holding `assignments`
        pub fn with_assignments(assignments: Vec<Assignment>) -> Self {
            let repo = Self::new();
            let mut max_id = 0;
            for assignment in assignments {
                max_id = max_id.max(assignment.id.0);
                repo.assignments.insert(assignment.id, assignment);
            }
            repo.next_id.store(max_id + 1, Ordering::SeqCst);
            repo
        }

        /// Status recorded for a test case
        pub fn test_status(&self, test_id: TestCaseId) -> Option<String> {
            self.test_status.get(&test_id).map(|s| s.clone())
        }

        /// Number of stored assignments
        pub fn len(&self) -> usize {
            self.assignments.len()
        }

        /// True when nothing is stored
        pub fn is_empty(&self) -> bool {
            self.assignments.is_empty()
        }
    }

    impl Default for MemoryAssignmentRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl AssignmentRepository for MemoryAssignmentRepository {
        async fn list_for_test(&self, test_id: TestCaseId) -> Result<Vec<Assignment>, CoreError> {
            let mut result: Vec<Assignment> = self
                .assignments
                .iter()
                .filter(|entry| entry.payload.test_id == test_id)
                .map(|entry| entry.value().clone())
                .collect();
            result.sort_by_key(|a| a.id);
            Ok(result)
        }

        async fn create(&self, payload: &AssignmentPayload) -> Result<Assignment, CoreError> {
            let id = AssignmentId(self.next_id.fetch_add(1, Ordering::SeqCst));
            let assignment = Assignment {
                id,
                payload: payload.clone().normalized(),
            };
            self.assignments.insert(id, assignment.clone());
            Ok(assignment)
        }

        async fn update(&self, id: AssignmentId, payload: &AssignmentPayload) -> Result<(), CoreError> {
            match self.assignments.get_mut(&id) {
                Some(mut entry) => {
                    entry.payload = payload.clone().normalized();
                    Ok(())
                }
                None => Err(CoreError::PersistenceError(format!("Assignment not found: {}", id))),
            }
        }

        async fn delete(&self, id: AssignmentId) -> Result<(), CoreError> {
            self.assignments
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| CoreError::PersistenceError(format!("Assignment not found: {}", id)))
        }

        async fn mark_parameterized(&self, test_id: TestCaseId) -> Result<(), CoreError> {
            self.test_status.insert(test_id, PARAMETERIZED_STATUS.to_string());
            Ok(())
        }
    }

    /// Records every command it is asked to send
    #[derive(Default)]
    pub struct MemoryCommandSink {
        sent: Mutex<Vec<(ExecutionId, MonitorCommand)>>,
    }

    impl MemoryCommandSink {
        /// Create an empty sink
        pub fn new() -> Self {
            Self::default()
        }

        /// Commands sent so far, in order
        pub fn sent(&self) -> Vec<(ExecutionId, MonitorCommand)> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ExecutionCommandSink for MemoryCommandSink {
        async fn send(&self, execution_id: ExecutionId, command: MonitorCommand) -> Result<(), CoreError> {
            let mut sent = self.sent.lock().map_err(|e| {
                CoreError::CommandError(format!("Failed to acquire sink lock: {}", e))
            })?;
            sent.push((execution_id, command));
            Ok(())
        }
    }
}
