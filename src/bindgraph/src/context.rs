use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::binding::{analyze_class, ClassShape};
use crate::decl::{ClassDecl, ClassIndex, ClassKind, MemberDecl};
use crate::error::StructuralError;
use crate::metadata::MetadataIndex;
use crate::options::Options;
use crate::types::ClassId;

type ShapeCache = HashMap<ClassId, Result<Option<Rc<ClassShape>>, StructuralError>>;

/// Everything resolution needs to know about the current compilation, plus
/// memoized answers to the questions asked about its classes.
///
/// One context lives for one processing pass. Memoized values only depend on
/// the immutable inputs, so populating them has no observable effect.
#[derive(Debug)]
pub struct ResolutionContext {
    options: Options,
    classes: ClassIndex,
    metadata: MetadataIndex,
    qualifiers: RefCell<HashMap<ClassId, bool>>,
    scopes: RefCell<HashMap<ClassId, bool>>,
    shapes: RefCell<ShapeCache>,
}

impl ResolutionContext {
    pub fn new(options: Options, classes: ClassIndex) -> Self {
        Self {
            options,
            classes,
            metadata: MetadataIndex::new(),
            qualifiers: RefCell::new(HashMap::new()),
            scopes: RefCell::new(HashMap::new()),
            shapes: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataIndex) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn classes(&self) -> &ClassIndex {
        &self.classes
    }

    pub fn metadata(&self) -> &MetadataIndex {
        &self.metadata
    }

    /// Returns true if annotations of class `id` are qualifiers.
    pub fn is_qualifier(&self, id: &ClassId) -> bool {
        Self::classify(
            &self.qualifiers,
            id,
            &self.options.builtin_qualifiers,
            &self.options.qualifier_annotations,
            &self.classes,
        )
    }

    /// Returns true if annotations of class `id` are scopes.
    pub fn is_scope(&self, id: &ClassId) -> bool {
        Self::classify(
            &self.scopes,
            id,
            &self.options.builtin_scopes,
            &self.options.scope_annotations,
            &self.classes,
        )
    }

    fn classify(
        cache: &RefCell<HashMap<ClassId, bool>>,
        id: &ClassId,
        builtin: &[ClassId],
        meta_annotations: &[ClassId],
        classes: &ClassIndex,
    ) -> bool {
        if let Some(known) = cache.borrow().get(id) {
            return *known;
        }
        let result = builtin.contains(id)
            || classes.get(id).is_some_and(|class| {
                class.kind == ClassKind::AnnotationClass
                    && meta_annotations.iter().any(|meta| class.has_annotation(meta))
            });
        cache.borrow_mut().insert(id.clone(), result);
        result
    }

    /// Returns how class `id` takes part in constructor injection, or `None` if
    /// it is unknown or not injectable.
    pub fn class_shape(&self, id: &ClassId) -> Result<Option<Rc<ClassShape>>, StructuralError> {
        if let Some(known) = self.shapes.borrow().get(id) {
            return known.clone();
        }
        let result = match self.classes.get(id) {
            Some(class) => analyze_class(class, self).map(|shape| shape.map(Rc::new)),
            None => Ok(None),
        };
        self.shapes.borrow_mut().insert(id.clone(), result.clone());
        result
    }

    /// Returns the injected members of class `id` and its superclasses,
    /// outermost superclass first.
    pub fn injected_members(&self, id: &ClassId) -> Vec<MemberDecl> {
        let mut chain: Vec<&ClassDecl> = Vec::new();
        let mut current = self.classes.get(id);
        while let Some(class) = current {
            if chain.iter().any(|visited| visited.id == class.id) {
                break;
            }
            chain.push(class);
            current = class
                .supertypes
                .iter()
                .filter_map(|ty| ty.class_id())
                .filter_map(|id| self.classes.get(id))
                .find(|supertype| supertype.kind == ClassKind::Class);
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|class| class.injected_members.iter().cloned())
            .collect()
    }
}
