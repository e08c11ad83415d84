use crate::key::TypeKey;
use crate::types::{ClassId, TypeRef};

/// A pattern used to match against keys.
pub trait Pattern {
    /// Tests whether the key matches the pattern.
    fn matches(&self, key: &TypeKey) -> bool;
}

/// A [`Pattern`] which matches all keys of one type and any qualifier.
///
/// # Examples
///
/// ```rust
/// # use bindgraph::key::{self, AnyQualifierPattern, Pattern};
/// # use bindgraph::types::TypeRef;
/// let pattern = AnyQualifierPattern::new(TypeRef::class("kotlin.Int"));
/// assert!(pattern.matches(&key::of(TypeRef::class("kotlin.Int"))));
/// assert!(pattern.matches(&key::named(TypeRef::class("kotlin.Int"), "named")));
/// assert!(!pattern.matches(&key::of(TypeRef::class("kotlin.Long"))));
/// ```
pub struct AnyQualifierPattern {
    ty: TypeRef,
}

impl AnyQualifierPattern {
    pub fn new(ty: TypeRef) -> Self {
        Self { ty }
    }
}

impl Pattern for AnyQualifierPattern {
    fn matches(&self, key: &TypeKey) -> bool {
        key.ty() == &self.ty
    }
}

/// A [`Pattern`] which matches keys whose type is an instance of a class,
/// regardless of type arguments, nullability and qualifier.
pub struct SameClassPattern {
    class_id: ClassId,
}

impl SameClassPattern {
    pub fn new(class_id: ClassId) -> Self {
        Self { class_id }
    }
}

impl Pattern for SameClassPattern {
    fn matches(&self, key: &TypeKey) -> bool {
        key.class_id() == Some(&self.class_id)
    }
}

/// A [`Pattern`] which only matches one key.
pub struct ExactPattern {
    key: TypeKey,
}

impl ExactPattern {
    pub fn new(key: TypeKey) -> Self {
        Self { key }
    }
}

impl Pattern for ExactPattern {
    fn matches(&self, key: &TypeKey) -> bool {
        key == &self.key
    }
}
