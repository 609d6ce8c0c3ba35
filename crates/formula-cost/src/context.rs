use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// Bookkeeping for one top-level cost query.
///
/// `path` holds the products currently being resolved (innermost last) and is what cycle
/// detection inspects; `memo` holds every product cost computed so far in this query so a
/// product shared by several branches is evaluated once. Build a fresh context per query:
/// memoized costs go stale as soon as the underlying tables change.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    path: Vec<PathEntry>,
    memo: HashMap<String, f64>,
    evaluations: usize,
}

#[derive(Debug)]
struct PathEntry {
    key: String,
    name: String,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display names of the products being resolved, outermost first.
    pub fn path(&self) -> Vec<&str> {
        self.path.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Number of formulas evaluated with this context (memo hits are not counted).
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Cost already resolved for `name` in this query, if any.
    pub fn memoized(&self, name: &str) -> Option<f64> {
        self.memo.get(&crate::names::normalize(name)).copied()
    }

    pub(crate) fn memo_get(&self, key: &str) -> Option<f64> {
        self.memo.get(key).copied()
    }

    pub(crate) fn is_resolving(&self, key: &str) -> bool {
        self.path.iter().any(|entry| entry.key == key)
    }

    /// The active path followed by `name`, i.e. the cycle closed by re-entering `name`.
    pub(crate) fn cycle_to(&self, name: &str) -> Vec<String> {
        self.path
            .iter()
            .map(|entry| entry.name.clone())
            .chain(std::iter::once(name.to_string()))
            .collect()
    }

    /// Pushes a product onto the active path; the returned guard pops it when dropped, so the
    /// path is unwound on error returns too.
    pub(crate) fn enter(&mut self, key: String, name: String) -> PathGuard<'_> {
        self.path.push(PathEntry { key, name });
        PathGuard { ctx: self }
    }

    pub(crate) fn record_evaluation(&mut self) {
        self.evaluations += 1;
    }

    pub(crate) fn remember(&mut self, key: String, cost: f64) {
        self.memo.entry(key).or_insert(cost);
    }
}

pub(crate) struct PathGuard<'a> {
    ctx: &'a mut ResolutionContext,
}

impl Deref for PathGuard<'_> {
    type Target = ResolutionContext;

    fn deref(&self) -> &ResolutionContext {
        self.ctx
    }
}

impl DerefMut for PathGuard<'_> {
    fn deref_mut(&mut self) -> &mut ResolutionContext {
        self.ctx
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.ctx.path.pop();
    }
}
