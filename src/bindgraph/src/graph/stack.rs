use std::fmt::Write;

use crate::binding::Provenance;
use crate::key::{ContextualTypeKey, TypeKey};

/// How an entry was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Requested by an accessor or injector of the graph.
    RequestedAt,
    /// Injected into a binding as one of its dependencies.
    InjectedAt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub request: ContextualTypeKey,
    pub usage: Usage,
    pub site: Provenance,
}

impl Entry {
    pub fn requested_at(request: ContextualTypeKey, site: Provenance) -> Self {
        Self {
            request,
            usage: Usage::RequestedAt,
            site,
        }
    }

    pub fn injected_at(request: ContextualTypeKey, site: Provenance) -> Self {
        Self {
            request,
            usage: Usage::InjectedAt,
            site,
        }
    }

    pub fn key(&self) -> &TypeKey {
        self.request.key()
    }
}

/// The chain of requests leading to the binding being resolved.
///
/// The bottom entry is always a root request. It is only used to produce
/// diagnostics and to detect cycles while expanding.
#[derive(Debug, Clone, Default)]
pub struct BindingStack {
    entries: Vec<Entry>,
}

impl BindingStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<Entry> {
        self.entries.pop()
    }

    pub fn top(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.position_of(key).is_some()
    }

    /// Returns the index of the first entry for `key`.
    pub fn position_of(&self, key: &TypeKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key() == key)
    }

    /// Returns the entries from `from` up to the top of the stack.
    pub fn slice(&self, from: usize) -> &[Entry] {
        self.entries.get(from..).unwrap_or_default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Renders the stack from the innermost request to the root, one line
    /// per entry.
    pub fn render_trace(&self) -> String {
        render_entries(&self.entries)
    }
}

/// Renders `entries` innermost first, e.g.
///
/// ```text
///     kotlin.Int is injected at
///         AppGraph.provideInt(value)
///     kotlin.Int is requested at
///         AppGraph.int
/// ```
pub fn render_entries(entries: &[Entry]) -> String {
    let mut trace = String::new();
    for entry in entries.iter().rev() {
        let verb = match entry.usage {
            Usage::RequestedAt => "requested",
            Usage::InjectedAt => "injected",
        };
        let _ = writeln!(trace, "    {} is {verb} at", entry.request);
        let _ = write!(trace, "        {}", entry.site);
        if !entry.site.location.is_unknown() {
            let _ = write!(trace, " ({})", entry.site.location);
        }
        trace.push('\n');
    }
    trace
}
