// src/action/mod.rs

//! Action execution protocol.
//!
//! An action is one step of a task. Its props are serialized into the task
//! node at configure time, and the action is reconstructed from them through
//! the [`ActionRegistry`] when a later build replays the task.
//!
//! Implement [`ActionKind`] for a serde struct; the blanket impl turns it into
//! the object-safe [`Action`] that task bodies and the build driver use.

pub mod builtin;
pub mod context;
pub mod registry;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::dag::ActionStore;
use crate::errors::Result;

pub use context::{CompletionHooks, ExecutionContext, SelfInvoker, Session};
pub use registry::ActionRegistry;

pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// A typed action with serde props.
pub trait ActionKind: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    /// Registered name, stored next to the props.
    const NAME: &'static str;

    fn execute<'a>(&'a self, ctx: &'a mut ExecutionContext) -> ActionFuture<'a>;
}

/// Object-safe view of an [`ActionKind`].
pub trait Action: Debug + Send + Sync {
    fn kind(&self) -> &'static str;

    fn props(&self) -> Result<serde_json::Value>;

    fn execute<'a>(&'a self, ctx: &'a mut ExecutionContext) -> ActionFuture<'a>;

    fn store(&self) -> Result<ActionStore> {
        Ok(ActionStore::new(self.kind(), self.props()?))
    }
}

impl<A: ActionKind> Action for A {
    fn kind(&self) -> &'static str {
        A::NAME
    }

    fn props(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn execute<'a>(&'a self, ctx: &'a mut ExecutionContext) -> ActionFuture<'a> {
        ActionKind::execute(self, ctx)
    }
}
