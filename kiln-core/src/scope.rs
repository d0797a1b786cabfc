//! Symbol table entries for the builtin namespace.
//!
//! Only what the builtin scope needs lives here: ordinary user scopes and
//! their lookup rules belong to the name-resolution collaborator.

use std::collections::HashMap;

use crate::error::InternalError;
use crate::types::Type;
use crate::utility::UtilityId;

/// Native symbol names of an extension type.
#[derive(Debug, Clone)]
pub struct ClassType {
    pub objstruct_cname: String,
    pub typeobj_cname: String,
    pub typeptr_cname: String,
    /// Fields and methods, in declaration order.
    pub members: Scope,
}

#[derive(Debug, Clone)]
pub enum EntryKind {
    Function { ty: Type },
    Typedef { base: Type },
    Variable { ty: Type, readonly: bool },
    Class(ClassType),
    Module(Scope),
}

impl EntryKind {
    pub fn describe(&self) -> &'static str {
        match self {
            EntryKind::Function { .. } => "function",
            EntryKind::Typedef { .. } => "typedef",
            EntryKind::Variable { .. } => "variable",
            EntryKind::Class(_) => "class",
            EntryKind::Module(_) => "module",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub cname: String,
    pub kind: EntryKind,
    /// Template that must be emitted when this entry is referenced.
    pub utility: Option<UtilityId>,
}

impl Entry {
    pub fn new(name: impl Into<String>, cname: impl Into<String>, kind: EntryKind) -> Self {
        Entry {
            name: name.into(),
            cname: cname.into(),
            kind,
            utility: None,
        }
    }

    pub fn with_utility(mut self, id: UtilityId) -> Self {
        self.utility = Some(id);
        self
    }

    pub fn as_module(&self) -> Option<&Scope> {
        match &self.kind {
            EntryKind::Module(scope) => Some(scope),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        match &self.kind {
            EntryKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, EntryKind::Typedef { .. } | EntryKind::Class(_))
    }
}

/// An insertion-ordered name table.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    name: String,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Scope {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an entry. Redeclaring a name inside a builtin scope is a bug in
    /// whoever populates it.
    pub fn declare(&mut self, entry: Entry) -> Result<&Entry, InternalError> {
        if self.index.contains_key(&entry.name) {
            return Err(InternalError::new(format!(
                "'{}' declared twice in scope '{}'",
                entry.name, self.name
            )));
        }
        let idx = self.entries.len();
        self.index.insert(entry.name.clone(), idx);
        self.entries.push(entry);
        Ok(&self.entries[idx])
    }

    pub fn lookup(&self, name: &str) -> Option<&Entry> {
        self.index.get(name).map(|idx| &self.entries[*idx])
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Entry> {
        match self.index.get(name) {
            Some(idx) => self.entries.get_mut(*idx),
            None => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let mut scope = Scope::new("m");
        for name in ["b", "a", "c"] {
            scope
                .declare(Entry::new(name, name, EntryKind::Typedef { base: Type::Int }))
                .unwrap();
        }
        assert_eq!(scope.names().collect::<Vec<_>>(), ["b", "a", "c"]);
        assert!(scope.lookup("a").unwrap().is_type());
    }

    #[test]
    fn duplicate_name_is_internal_error() {
        let mut scope = Scope::new("m");
        let entry = Entry::new(
            "x",
            "m_x",
            EntryKind::Variable {
                ty: Type::Int,
                readonly: true,
            },
        );
        scope.declare(entry.clone()).unwrap();
        let err = scope.declare(entry).unwrap_err();
        assert!(err.message.contains("declared twice"));
        assert_eq!(scope.len(), 1);
    }
}
