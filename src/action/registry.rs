// src/action/registry.rs

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::action::builtin::{AnotherTask, CopyFiles, Exec, Parallel};
use crate::action::{Action, ActionKind};
use crate::dag::ActionStore;
use crate::errors::{Result, YesbuildError};

type Constructor = fn(serde_json::Value) -> serde_json::Result<Box<dyn Action>>;

fn construct<A: ActionKind>(props: serde_json::Value) -> serde_json::Result<Box<dyn Action>> {
    let action: A = serde_json::from_value(props)?;
    Ok(Box::new(action))
}

/// Maps a stored action name back to a constructor.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("ActionRegistry")
            .field("actions", &names)
            .finish()
    }
}

impl ActionRegistry {
    /// An empty registry. Most callers want [`ActionRegistry::with_builtins`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert::<AnotherTask>();
        registry.insert::<Parallel>();
        registry.insert::<CopyFiles>();
        registry.insert::<Exec>();
        registry
    }

    fn insert<A: ActionKind>(&mut self) {
        self.constructors.insert(A::NAME, construct::<A>);
    }

    pub fn register<A: ActionKind>(&mut self) -> Result<()> {
        if self.constructors.contains_key(A::NAME) {
            return Err(YesbuildError::DuplicateAction(A::NAME.to_string()));
        }
        self.insert::<A>();
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Rebuild the action stored for `task`.
    pub fn instantiate(&self, store: &ActionStore, task: &str) -> Result<Box<dyn Action>> {
        let constructor =
            self.constructors
                .get(store.name.as_str())
                .ok_or_else(|| YesbuildError::UnknownAction {
                    action: store.name.clone(),
                    task: task.to_string(),
                })?;
        trace!(action = %store.name, task, "instantiating stored action");

        constructor(store.props.clone()).map_err(|source| YesbuildError::ActionFailed {
            task: task.to_string(),
            source: anyhow::Error::new(source)
                .context(format!("invalid props for action '{}'", store.name)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_round_trip_through_store() {
        let registry = ActionRegistry::with_builtins();
        let action = AnotherTask::new("assets");
        let store = Action::store(&action).unwrap();
        assert_eq!(store.name, "internal:anotherTask");

        let rebuilt = registry.instantiate(&store, "site").unwrap();
        assert_eq!(rebuilt.props().unwrap(), store.props);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ActionRegistry::with_builtins();
        assert!(matches!(
            registry.register::<CopyFiles>(),
            Err(YesbuildError::DuplicateAction(name)) if name == "internal:copy"
        ));
    }

    #[test]
    fn unknown_action_names_action_and_task() {
        let registry = ActionRegistry::new();
        let store = ActionStore::new("plugin:esbuild", serde_json::Value::Null);
        match registry.instantiate(&store, "bundle") {
            Err(YesbuildError::UnknownAction { action, task }) => {
                assert_eq!(action, "plugin:esbuild");
                assert_eq!(task, "bundle");
            }
            other => panic!("expected UnknownAction, got {other:?}"),
        }
    }

    #[test]
    fn malformed_props_fail_the_task() {
        let registry = ActionRegistry::with_builtins();
        let store = ActionStore::new("internal:parallel", serde_json::json!({ "tasks": 3 }));
        assert!(matches!(
            registry.instantiate(&store, "all"),
            Err(YesbuildError::ActionFailed { .. })
        ));
    }
}
