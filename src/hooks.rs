//! Execution hooks.
//!
//! Three ordered lists of callbacks run around every execution: pre-execute,
//! post-execute and unhandled-exception. Hooks are append-only and run in
//! registration order, synchronously, on the task executing the command.
//!
//! The lists are snapshotted under the lock and invoked outside it, so a hook
//! may register further hooks; those apply from the next execution on.

use crate::command::DatabaseCommand;
use crate::error::Error;
use std::sync::{Arc, PoisonError, RwLock};

/// Hook invoked with the command before or after the driver call.
pub type CommandHook = Arc<dyn Fn(&DatabaseCommand) + Send + Sync>;

/// Hook invoked with the error and the command when an execution fails.
pub type ExceptionHook = Arc<dyn Fn(&Error, &DatabaseCommand) + Send + Sync>;

#[derive(Default)]
struct Hooks {
    pre_execute: Vec<CommandHook>,
    post_execute: Vec<CommandHook>,
    unhandled_exception: Vec<ExceptionHook>,
}

/// Registry of execution hooks, shared between clones.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Arc<RwLock<Hooks>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("HookRegistry")
            .field("pre_execute", &hooks.pre_execute.len())
            .field("post_execute", &hooks.post_execute.len())
            .field("unhandled_exception", &hooks.unhandled_exception.len())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pre_execute<F>(&self, hook: F)
    where
        F: Fn(&DatabaseCommand) + Send + Sync + 'static,
    {
        self.write().pre_execute.push(Arc::new(hook));
    }

    pub fn add_post_execute<F>(&self, hook: F)
    where
        F: Fn(&DatabaseCommand) + Send + Sync + 'static,
    {
        self.write().post_execute.push(Arc::new(hook));
    }

    pub fn add_unhandled_exception<F>(&self, hook: F)
    where
        F: Fn(&Error, &DatabaseCommand) + Send + Sync + 'static,
    {
        self.write().unhandled_exception.push(Arc::new(hook));
    }

    pub fn pre_execute_count(&self) -> usize {
        self.read().pre_execute.len()
    }

    pub fn post_execute_count(&self) -> usize {
        self.read().post_execute.len()
    }

    pub fn unhandled_exception_count(&self) -> usize {
        self.read().unhandled_exception.len()
    }

    pub(crate) fn run_pre_execute(&self, command: &DatabaseCommand) {
        let hooks = self.read().pre_execute.clone();
        for hook in hooks {
            hook(command);
        }
    }

    pub(crate) fn run_post_execute(&self, command: &DatabaseCommand) {
        let hooks = self.read().post_execute.clone();
        for hook in hooks {
            hook(command);
        }
    }

    pub(crate) fn run_unhandled_exception(&self, error: &Error, command: &DatabaseCommand) {
        let hooks = self.read().unhandled_exception.clone();
        for hook in hooks {
            hook(error, command);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Hooks> {
        self.hooks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Hooks> {
        self.hooks.write().unwrap_or_else(PoisonError::into_inner)
    }
}
