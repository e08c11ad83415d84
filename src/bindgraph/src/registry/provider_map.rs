use std::collections::{BTreeMap, HashMap};

use crate::binding::{BoundSource, MultibindingShape};
use crate::decl::{BindsDecl, ParamDecl, ProviderDecl};
use crate::diagnostics::SourceLocation;
use crate::key::TypeKey;

/// An explicit declaration satisfying one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declared {
    Provider(ProviderDecl),
    Binds(BindsDecl),
    BoundInstance {
        param: ParamDecl,
        source: BoundSource,
        location: SourceLocation,
    },
}

impl Declared {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::Provider(decl) => &decl.location,
            Self::Binds(decl) => &decl.location,
            Self::BoundInstance { location, .. } => location,
        }
    }

    /// Identity used for override resolution: callables with the same
    /// signature override each other regardless of where they are declared.
    pub fn signature(&self) -> String {
        let render = |name: &str, parameters: &[ParamDecl]| {
            let parameters: Vec<String> =
                parameters.iter().map(|param| param.ty.to_string()).collect();
            format!("{name}({})", parameters.join(", "))
        };
        match self {
            Self::Provider(decl) => render(&decl.callable.name, &decl.parameters),
            Self::Binds(decl) => render(&decl.callable.name, &decl.parameters),
            Self::BoundInstance { source, .. } => match source {
                BoundSource::CreatorParameter { name } => format!("creator parameter {name}"),
                BoundSource::IncludedGraph { name } => format!("included graph {name}"),
                BoundSource::Graph => "graph instance".to_string(),
            },
        }
    }

    pub fn inheritance_depth(&self) -> u32 {
        match self {
            Self::Provider(decl) => decl.inheritance_depth,
            Self::Binds(decl) => decl.inheritance_depth,
            Self::BoundInstance { .. } => 0,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Provider(decl) => format!("provider {} at {}", decl.callable, decl.location),
            Self::Binds(decl) => format!("binds {} at {}", decl.callable, decl.location),
            Self::BoundInstance { location, .. } => format!("{} at {location}", self.signature()),
        }
    }
}

/// An accessor of an included graph instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedAccessor {
    pub graph: TypeKey,
    pub parameter: String,
    pub accessor: String,
    pub location: SourceLocation,
}

/// The frozen result of registering every declaration of one graph.
#[derive(Debug, Default)]
pub struct ProviderMap {
    declared: HashMap<TypeKey, Declared>,
    multibindings: BTreeMap<TypeKey, (MultibindingShape, SourceLocation)>,
    included: HashMap<TypeKey, IncludedAccessor>,
}

impl ProviderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: TypeKey, declared: Declared) -> Option<Declared> {
        self.declared.insert(key, declared)
    }

    pub fn insert_multibinding(
        &mut self,
        key: TypeKey,
        shape: MultibindingShape,
        location: SourceLocation,
    ) {
        self.multibindings.insert(key, (shape, location));
    }

    /// Keeps the first accessor registered for a key.
    pub fn insert_included(&mut self, key: TypeKey, accessor: IncludedAccessor) -> bool {
        if self.included.contains_key(&key) {
            return false;
        }
        self.included.insert(key, accessor);
        true
    }

    pub fn get(&self, key: &TypeKey) -> Option<&Declared> {
        self.declared.get(key)
    }

    pub fn multibinding(&self, key: &TypeKey) -> Option<(&MultibindingShape, &SourceLocation)> {
        self.multibindings
            .get(key)
            .map(|(shape, location)| (shape, location))
    }

    pub fn included(&self, key: &TypeKey) -> Option<&IncludedAccessor> {
        self.included.get(key)
    }

    /// Returns true if the map itself can satisfy `key`.
    pub fn provides(&self, key: &TypeKey) -> bool {
        self.declared.contains_key(key)
            || self.multibindings.contains_key(key)
            || self.included.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.declared
            .keys()
            .chain(self.multibindings.keys())
            .chain(self.included.keys())
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::CollectionKind;
    use crate::decl::dsl::{param, provides, ty};
    use crate::key;

    use super::*;

    #[test]
    fn provider_map_insert_succeeds() {
        let mut map = ProviderMap::new();
        let decl = provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .build();
        assert!(map
            .insert(key::of(ty("kotlin.String")), Declared::Provider(decl.clone()))
            .is_none());
        assert!(map
            .insert(key::of(ty("kotlin.String")), Declared::Provider(decl))
            .is_some());
        assert!(map.provides(&key::of(ty("kotlin.String"))));
        assert!(!map.provides(&key::of(ty("kotlin.Int"))));
    }

    #[test]
    fn provider_map_insert_included_succeeds_when_key_is_taken() {
        let mut map = ProviderMap::new();
        let accessor = |parameter: &str| IncludedAccessor {
            graph: key::of(ty("test.NetworkGraph")),
            parameter: parameter.to_string(),
            accessor: "client".to_string(),
            location: SourceLocation::default(),
        };
        assert!(map.insert_included(key::of(ty("test.Client")), accessor("first")));
        assert!(!map.insert_included(key::of(ty("test.Client")), accessor("second")));
        assert_eq!(
            map.included(&key::of(ty("test.Client"))).unwrap().parameter,
            "first"
        );
    }

    #[test]
    fn provider_map_keys_succeeds() {
        let mut map = ProviderMap::new();
        map.insert(
            key::of(ty("kotlin.String")),
            Declared::BoundInstance {
                param: param("name", ty("kotlin.String")).build(),
                source: BoundSource::CreatorParameter {
                    name: "name".to_string(),
                },
                location: SourceLocation::default(),
            },
        );
        map.insert_multibinding(
            key::of(ty("kotlin.collections.Set")),
            MultibindingShape {
                collection: CollectionKind::Set,
                contributions: Vec::new(),
                allow_empty: true,
                duplicates: Vec::new(),
            },
            SourceLocation::default(),
        );

        let mut keys: Vec<String> = map.keys().map(ToString::to_string).collect();
        keys.sort();
        assert_eq!(keys, ["kotlin.String", "kotlin.collections.Set"]);
    }
}
