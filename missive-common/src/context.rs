//! Caller-scoped state that must be active while a queue item is processed.
//!
//! A caller submits work from inside some execution context (the wiki it is
//! acting on, the user it acts for). Workers run on their own tasks, so the
//! context travels with every queue item and is re-activated around the
//! processing of that one item with a [`ContextScope`].

use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Snapshot of the caller state a queue item is processed under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// The wiki (tenant) the work belongs to
    pub wiki_id: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(wiki_id: impl Into<String>) -> Self {
        Self {
            wiki_id: wiki_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Activation of execution contexts.
///
/// Implementations must keep one stack per worker so that workers never
/// observe each other's contexts.
pub trait ContextProvider: Send + Sync + Debug {
    fn push(&self, context: ExecutionContext);

    fn pop(&self) -> Option<ExecutionContext>;

    /// The innermost active context
    fn current(&self) -> Option<ExecutionContext>;
}

/// The default [`ContextProvider`]: a plain stack
#[derive(Debug, Default)]
pub struct ContextStack {
    stack: Mutex<Vec<ExecutionContext>>,
}

impl ContextStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }
}

impl ContextProvider for ContextStack {
    fn push(&self, context: ExecutionContext) {
        self.stack.lock().push(context);
    }

    fn pop(&self) -> Option<ExecutionContext> {
        self.stack.lock().pop()
    }

    fn current(&self) -> Option<ExecutionContext> {
        self.stack.lock().last().cloned()
    }
}

/// Guard that keeps a context active until dropped.
///
/// The pop runs on every exit path, including early returns and unwinding.
#[derive(Debug)]
#[must_use = "the context is deactivated as soon as the scope is dropped"]
pub struct ContextScope {
    provider: Arc<dyn ContextProvider>,
}

impl ContextScope {
    pub fn enter(provider: &Arc<dyn ContextProvider>, context: ExecutionContext) -> Self {
        provider.push(context);
        Self {
            provider: Arc::clone(provider),
        }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.provider.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Arc<dyn ContextProvider> {
        Arc::new(ContextStack::new())
    }

    #[test]
    fn test_scope_restores_previous_context() {
        let provider = provider();
        provider.push(ExecutionContext::new("main"));

        {
            let _scope = ContextScope::enter(&provider, ExecutionContext::new("subwiki"));
            assert_eq!(provider.current().unwrap().wiki_id, "subwiki");

            {
                let _inner = ContextScope::enter(
                    &provider,
                    ExecutionContext::new("nested").with_user("XWiki.Admin"),
                );
                let current = provider.current().unwrap();
                assert_eq!(current.wiki_id, "nested");
                assert_eq!(current.user.as_deref(), Some("XWiki.Admin"));
            }

            assert_eq!(provider.current().unwrap().wiki_id, "subwiki");
        }

        assert_eq!(provider.current().unwrap().wiki_id, "main");
    }

    #[test]
    fn test_scope_pops_when_unwinding() {
        let stack = Arc::new(ContextStack::new());
        let provider: Arc<dyn ContextProvider> = stack.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = ContextScope::enter(&provider, ExecutionContext::new("doomed"));
            panic!("processing failed");
        }));

        assert!(result.is_err());
        assert_eq!(stack.depth(), 0);
        assert!(provider.current().is_none());
    }

    #[test]
    fn test_separate_stacks_are_isolated() {
        let first = provider();
        let second = provider();

        let _a = ContextScope::enter(&first, ExecutionContext::new("alpha"));
        let _b = ContextScope::enter(&second, ExecutionContext::new("beta"));

        assert_eq!(first.current().unwrap().wiki_id, "alpha");
        assert_eq!(second.current().unwrap().wiki_id, "beta");
    }
}
