use std::fmt;
use std::sync::Arc;

use log::debug;

use super::{
    Handler, HandlerArgs, HandlerContext, HandlerOutput, Middleware, MiddlewareOptions, Next,
    Pluggable,
};
use crate::error::{SdkError, SdkResult};

#[derive(Clone)]
struct Entry {
    middleware: Arc<dyn Middleware>,
    options: MiddlewareOptions,
}

/// Ordered, named collection of middleware.
///
/// Execution order is by step, then priority, then registration order. Names are
/// unique within a stack; unnamed entries can only be removed by tag.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    entries: Vec<Entry>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.options.name.as_deref() == Some(name))
    }

    /// Register `middleware`. A duplicate name fails unless the options ask to
    /// override, in which case the existing entry is replaced in place.
    pub fn add(
        &mut self,
        middleware: Arc<dyn Middleware>,
        options: MiddlewareOptions,
    ) -> SdkResult<()> {
        let existing = options.name.as_deref().and_then(|name| self.position(name));
        let entry = Entry {
            middleware,
            options,
        };
        match existing {
            None => self.entries.push(entry),
            Some(index) if entry.options.override_existing => {
                let current = &self.entries[index].options;
                if current.step != entry.options.step || current.priority != entry.options.priority
                {
                    return Err(SdkError::Stack(format!(
                        "\"{}\" middleware {} ({:?}) cannot be overridden by middleware at {} ({:?})",
                        entry.options.name.as_deref().unwrap_or_default(),
                        current.step,
                        current.priority,
                        entry.options.step,
                        entry.options.priority,
                    )));
                }
                debug!(
                    "Overriding middleware {}",
                    entry.options.name.as_deref().unwrap_or_default()
                );
                self.entries[index] = entry;
            }
            Some(_) => {
                return Err(SdkError::Stack(format!(
                    "Duplicate middleware name '{}'",
                    entry.options.name.as_deref().unwrap_or_default()
                )));
            }
        }
        Ok(())
    }

    /// Remove the entry called `name`. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.options.name.as_deref() != Some(name));
        self.entries.len() != before
    }

    /// Remove every entry carrying `tag`. Returns whether anything was removed.
    pub fn remove_by_tag(&mut self, tag: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !e.options.tags.iter().any(|t| t == tag));
        self.entries.len() != before
    }

    pub fn use_plugin(&mut self, plugin: &dyn Pluggable) -> SdkResult<()> {
        plugin.apply_to_stack(self)
    }

    /// A new stack holding this stack's entries followed by `other`'s.
    pub fn concat(&self, other: &MiddlewareStack) -> SdkResult<MiddlewareStack> {
        let mut merged = self.clone();
        for entry in &other.entries {
            merged.add(entry.middleware.clone(), entry.options.clone())?;
        }
        Ok(merged)
    }

    fn ordered(&self) -> Vec<&Entry> {
        let mut ordered: Vec<&Entry> = self.entries.iter().collect();
        ordered.sort_by_key(|e| (e.options.step, e.options.priority));
        ordered
    }

    /// Entry descriptions in execution order, e.g. `"retryMiddleware - finalizeRequest"`.
    pub fn identify(&self) -> Vec<String> {
        self.ordered()
            .into_iter()
            .map(|e| {
                format!(
                    "{} - {}",
                    e.options.name.as_deref().unwrap_or("anonymous"),
                    e.options.step
                )
            })
            .collect()
    }

    /// Freeze the current entries into an executable pipeline ending at `terminal`.
    pub fn resolve(&self, terminal: Arc<dyn Handler>, context: HandlerContext) -> ResolvedHandler {
        ResolvedHandler {
            chain: self
                .ordered()
                .into_iter()
                .map(|e| e.middleware.clone())
                .collect(),
            terminal,
            context: Arc::new(context),
        }
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.identify()).finish()
    }
}

/// An executable pipeline produced by [`MiddlewareStack::resolve`].
pub struct ResolvedHandler {
    chain: Vec<Arc<dyn Middleware>>,
    terminal: Arc<dyn Handler>,
    context: Arc<HandlerContext>,
}

impl ResolvedHandler {
    pub async fn handle(&self, args: HandlerArgs) -> SdkResult<HandlerOutput> {
        Next::new(&self.chain, self.terminal.as_ref())
            .run(args, &self.context)
            .await
    }

    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("layers", &self.chain.len())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
