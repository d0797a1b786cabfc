//! Deferred code templates ("utility code") backing builtin declarations.
//!
//! Templates are registered once per context and materialized lazily:
//! a [`UtilitySink`] belongs to one emitted module and remembers which
//! template ids it already holds, so each template lands in the output
//! at most once, in first-reference order.

use std::collections::HashSet;
use std::fmt;

use crate::error::InternalError;

/// Identity of a registered template. Deduplication is by id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtilityId(pub u32);

impl fmt::Display for UtilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utility#{}", self.0)
    }
}

/// Produces the template body for the given symbol prefix.
pub type Generator = fn(prefix: &str) -> String;

#[derive(Debug, Clone)]
pub struct UtilityTemplate {
    pub name: &'static str,
    /// Prefix substituted into every symbol the template defines.
    pub prefix: &'static str,
    /// Templates that must be emitted before this one.
    pub requires: Vec<UtilityId>,
    pub generate: Generator,
}

/// One materialized template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilityFragment {
    pub id: UtilityId,
    pub name: &'static str,
    pub code: String,
}

/// Per-module record of emitted templates.
#[derive(Debug, Default, Clone)]
pub struct UtilitySink {
    emitted: HashSet<UtilityId>,
    fragments: Vec<UtilityFragment>,
}

impl UtilitySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: UtilityId) -> bool {
        self.emitted.contains(&id)
    }

    /// Fragments in emission order.
    pub fn fragments(&self) -> &[UtilityFragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn into_fragments(self) -> Vec<UtilityFragment> {
        self.fragments
    }
}

#[derive(Debug, Default)]
pub struct UtilityRegistry {
    templates: Vec<UtilityTemplate>,
}

impl UtilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, template: UtilityTemplate) -> UtilityId {
        let id = UtilityId(self.templates.len() as u32);
        tracing::trace!(%id, name = template.name, "registered utility template");
        self.templates.push(template);
        id
    }

    pub fn get(&self, id: UtilityId) -> Option<&UtilityTemplate> {
        self.templates.get(id.0 as usize)
    }

    pub fn find(&self, name: &str) -> Option<UtilityId> {
        self.templates
            .iter()
            .position(|t| t.name == name)
            .map(|idx| UtilityId(idx as u32))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Emit `id` (and, before it, everything it requires) into `sink`.
    ///
    /// Already-emitted templates are skipped. Returns whether `id` itself
    /// was newly emitted.
    pub fn materialize(&self, id: UtilityId, sink: &mut UtilitySink) -> Result<bool, InternalError> {
        let mut visiting = Vec::new();
        self.materialize_inner(id, sink, &mut visiting)
    }

    fn materialize_inner(
        &self,
        id: UtilityId,
        sink: &mut UtilitySink,
        visiting: &mut Vec<UtilityId>,
    ) -> Result<bool, InternalError> {
        if sink.emitted.contains(&id) {
            return Ok(false);
        }
        if visiting.contains(&id) {
            return Err(InternalError::new(format!(
                "utility template {id} requires itself"
            )));
        }
        let template = self
            .get(id)
            .ok_or_else(|| InternalError::new(format!("unknown utility template {id}")))?;

        visiting.push(id);
        for dep in &template.requires {
            self.materialize_inner(*dep, sink, visiting)?;
        }
        visiting.pop();

        let code = (template.generate)(template.prefix);
        tracing::debug!(%id, name = template.name, bytes = code.len(), "materialized utility template");
        sink.emitted.insert(id);
        sink.fragments.push(UtilityFragment {
            id,
            name: template.name,
            code,
        });
        Ok(true)
    }
}
