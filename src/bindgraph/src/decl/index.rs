use std::collections::{HashMap, HashSet};

use crate::decl::ClassDecl;
use crate::types::ClassId;

/// All class declarations visible to the current compilation unit.
#[derive(Debug, Default, Clone)]
pub struct ClassIndex {
    classes: HashMap<ClassId, ClassDecl>,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class, returning the declaration it replaced.
    pub fn insert(&mut self, class: ClassDecl) -> Option<ClassDecl> {
        self.classes.insert(class.id.clone(), class)
    }

    pub fn get(&self, id: &ClassId) -> Option<&ClassDecl> {
        self.classes.get(id)
    }

    pub fn contains(&self, id: &ClassId) -> bool {
        self.classes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Returns true if `sub` is `sup` or transitively lists it as a supertype.
    /// Supertypes missing from the index end the walk on that branch.
    pub fn is_subtype(&self, sub: &ClassId, sup: &ClassId) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![sub];
        while let Some(current) = pending.pop() {
            if current == sup {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(class) = self.classes.get(current) {
                pending.extend(class.supertypes.iter().filter_map(|ty| ty.class_id()));
            }
        }
        false
    }
}

impl FromIterator<ClassDecl> for ClassIndex {
    fn from_iter<T: IntoIterator<Item = ClassDecl>>(iter: T) -> Self {
        Self {
            classes: iter
                .into_iter()
                .map(|class| (class.id.clone(), class))
                .collect(),
        }
    }
}
