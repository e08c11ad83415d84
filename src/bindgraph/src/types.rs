use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// Fully-qualified identity of a class declaration, e.g. `kotlin.String`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(String);

impl ClassId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The simple name, i.e. the segment after the last `.`.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl Display for ClassId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClassId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A resolved type as seen by the checker layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeRef {
    Class {
        id: ClassId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        arguments: Vec<TypeRef>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        nullable: bool,
    },
    /// A type variable that has not been substituted yet.
    Parameter { name: String },
}

/// Mapping from type-parameter names to the concrete arguments of one use site.
pub type Substitution = HashMap<String, TypeRef>;

impl TypeRef {
    pub fn class(id: impl Into<ClassId>) -> Self {
        Self::Class {
            id: id.into(),
            arguments: Vec::new(),
            nullable: false,
        }
    }

    pub fn generic(id: impl Into<ClassId>, arguments: impl IntoIterator<Item = TypeRef>) -> Self {
        Self::Class {
            id: id.into(),
            arguments: arguments.into_iter().collect(),
            nullable: false,
        }
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter { name: name.into() }
    }

    pub fn nullable(self) -> Self {
        match self {
            Self::Class { id, arguments, .. } => Self::Class {
                id,
                arguments,
                nullable: true,
            },
            parameter => parameter,
        }
    }

    pub fn class_id(&self) -> Option<&ClassId> {
        match self {
            Self::Class { id, .. } => Some(id),
            Self::Parameter { .. } => None,
        }
    }

    pub fn arguments(&self) -> &[TypeRef] {
        match self {
            Self::Class { arguments, .. } => arguments,
            Self::Parameter { .. } => &[],
        }
    }

    /// Returns the single type argument of `self` if it is an instance of `wrapper`.
    pub fn unwrap_single(&self, wrapper: &ClassId) -> Option<&TypeRef> {
        match self {
            Self::Class { id, arguments, .. } if id == wrapper && arguments.len() == 1 => {
                arguments.first()
            }
            _ => None,
        }
    }

    pub fn is_instance_of(&self, class: &ClassId) -> bool {
        self.class_id() == Some(class)
    }

    /// Replaces every type variable found in `substitution`. Unknown variables
    /// are left untouched.
    pub fn substitute(&self, substitution: &Substitution) -> TypeRef {
        if substitution.is_empty() {
            return self.clone();
        }
        match self {
            Self::Class {
                id,
                arguments,
                nullable,
            } => Self::Class {
                id: id.clone(),
                arguments: arguments
                    .iter()
                    .map(|argument| argument.substitute(substitution))
                    .collect(),
                nullable: *nullable,
            },
            Self::Parameter { name } => substitution
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
        }
    }

    pub fn contains_parameters(&self) -> bool {
        match self {
            Self::Class { arguments, .. } => arguments.iter().any(TypeRef::contains_parameters),
            Self::Parameter { .. } => true,
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Class {
                id,
                arguments,
                nullable,
            } => {
                write!(f, "{id}")?;
                if !arguments.is_empty() {
                    f.write_str("<")?;
                    for (i, argument) in arguments.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{argument}")?;
                    }
                    f.write_str(">")?;
                }
                if *nullable {
                    f.write_str("?")?;
                }
                Ok(())
            }
            Self::Parameter { name } => f.write_str(name),
        }
    }
}

/// Builds the substitution binding `parameters` to the `arguments` of a use site.
pub fn substitution_for(parameters: &[String], arguments: &[TypeRef]) -> Substitution {
    parameters
        .iter()
        .cloned()
        .zip(arguments.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ref_display_succeeds() {
        let list = TypeRef::generic("kotlin.collections.List", [TypeRef::class("kotlin.String")]);
        assert_eq!(list.to_string(), "kotlin.collections.List<kotlin.String>");

        let map = TypeRef::generic(
            "kotlin.collections.Map",
            [TypeRef::class("kotlin.String"), TypeRef::class("kotlin.Int").nullable()],
        );
        assert_eq!(
            map.to_string(),
            "kotlin.collections.Map<kotlin.String, kotlin.Int?>"
        );
    }

    #[test]
    fn type_ref_substitute_succeeds() {
        let boxed = TypeRef::generic("test.Box", [TypeRef::parameter("T")]);
        let substitution = substitution_for(&["T".to_string()], &[TypeRef::class("kotlin.Int")]);

        let concrete = boxed.substitute(&substitution);
        assert_eq!(concrete.to_string(), "test.Box<kotlin.Int>");
        assert!(!concrete.contains_parameters());
        assert!(boxed.contains_parameters());
    }

    #[test]
    fn type_ref_unwrap_single_succeeds() {
        let provider = ClassId::new("test.Provider");
        let wrapped = TypeRef::generic(provider.clone(), [TypeRef::class("kotlin.Int")]);

        assert_eq!(
            wrapped.unwrap_single(&provider),
            Some(&TypeRef::class("kotlin.Int"))
        );
        assert_eq!(TypeRef::class("kotlin.Int").unwrap_single(&provider), None);
    }

    #[test]
    fn class_id_short_name_succeeds() {
        assert_eq!(ClassId::new("kotlin.collections.Set").short_name(), "Set");
        assert_eq!(ClassId::new("Plain").short_name(), "Plain");
    }
}
