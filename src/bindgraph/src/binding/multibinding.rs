use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::binding::{Binding, BindingKind, Dependency, Provenance};
use crate::decl::{Annotation, CallableId, ContributionKind};
use crate::diagnostics::SourceLocation;
use crate::error::{InvalidMultibindingTypeSnafu, StructuralError};
use crate::key::{self, Qualifier, TypeKey};
use crate::options::Options;
use crate::types::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionKind {
    Set,
    Map,
}

impl CollectionKind {
    pub fn of(ty: &TypeRef, options: &Options) -> Option<Self> {
        if ty.is_instance_of(&options.set_type) && ty.arguments().len() == 1 {
            Some(Self::Set)
        } else if ty.is_instance_of(&options.map_type) && ty.arguments().len() == 2 {
            Some(Self::Map)
        } else {
            None
        }
    }

    pub fn to_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Map => "map",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Set => "set multibinding",
            Self::Map => "map multibinding",
        }
    }
}

/// One contribution to a multibinding. The contributed value is an ordinary
/// graph node under `element`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub element: TypeKey,
    pub kind: ContributionKind,
    pub source: CallableId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultibindingShape {
    pub collection: CollectionKind,
    pub contributions: Vec<Contribution>,
    pub allow_empty: bool,
    /// Contribution identities that were declared more than once.
    pub duplicates: Vec<String>,
}

impl MultibindingShape {
    pub fn into_binding(self, key: TypeKey, provenance: Provenance) -> Binding {
        let dependencies = self
            .contributions
            .iter()
            .map(|contribution| {
                Dependency::new(
                    contribution.element.clone().into(),
                    Provenance::new(
                        format!("contribution {}", contribution.source),
                        provenance.location.clone(),
                    ),
                )
            })
            .collect();
        Binding::new(key, BindingKind::Multibinding(self), provenance).with_dependencies(dependencies)
    }
}

/// Returns the key of the multibinding a contribution returning `ty` belongs to.
pub fn multibinding_key(
    kind: &ContributionKind,
    ty: &TypeRef,
    qualifier: Option<Qualifier>,
    callable: &CallableId,
    location: &SourceLocation,
    options: &Options,
) -> Result<TypeKey, StructuralError> {
    let collection = match kind {
        ContributionKind::IntoSet => TypeRef::generic(options.set_type.clone(), [ty.clone()]),
        ContributionKind::ElementsIntoSet => {
            let [element] = ty.arguments() else {
                return InvalidMultibindingTypeSnafu {
                    callable: callable.to_string(),
                    ty: ty.to_string(),
                    location: location.clone(),
                }
                .fail();
            };
            TypeRef::generic(options.set_type.clone(), [element.clone()])
        }
        ContributionKind::IntoMap { key_type, .. } => {
            TypeRef::generic(options.map_type.clone(), [key_type.clone(), ty.clone()])
        }
    };
    Ok(TypeKey::new(collection, qualifier))
}

/// Returns the internal key one contribution is registered under.
pub fn element_key(
    multibinding: &TypeKey,
    ty: TypeRef,
    source: &CallableId,
    options: &Options,
) -> TypeKey {
    key::qualified(
        ty,
        Annotation::new(options.multibinding_element.clone())
            .with_argument(multibinding.as_str())
            .with_argument(format!("{}.{}", source.owner, source.name)),
    )
}

/// A contribution waiting for override resolution.
#[derive(Debug, Clone)]
pub(crate) struct Candidate<T> {
    pub signature: String,
    pub depth: u32,
    pub contribution: Contribution,
    pub location: SourceLocation,
    pub item: T,
}

#[derive(Debug)]
struct Pending<T> {
    collection: CollectionKind,
    declared: Option<(bool, SourceLocation)>,
    first_location: SourceLocation,
    candidates: Vec<Candidate<T>>,
}

/// A multibinding whose contributions are all known.
#[derive(Debug)]
pub(crate) struct Frozen<T> {
    pub shape: MultibindingShape,
    pub location: SourceLocation,
    pub winners: Vec<T>,
}

/// Collects every contribution of a graph before any multibinding is
/// published. Nothing can be read back until [`freeze`] is called.
///
/// [`freeze`]: MultibindingCollector::freeze
#[derive(Debug)]
pub(crate) struct MultibindingCollector<T> {
    pending: BTreeMap<TypeKey, Pending<T>>,
}

impl<T> MultibindingCollector<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    pub fn declare(
        &mut self,
        key: TypeKey,
        collection: CollectionKind,
        allow_empty: bool,
        location: SourceLocation,
    ) {
        let pending = self.pending_mut(key, collection, &location);
        let declared = pending.declared.get_or_insert((allow_empty, location));
        declared.0 |= allow_empty;
    }

    pub fn contribute(&mut self, key: TypeKey, collection: CollectionKind, candidate: Candidate<T>) {
        let pending = self.pending_mut(key, collection, &candidate.location);
        pending.candidates.push(candidate);
    }

    fn pending_mut(
        &mut self,
        key: TypeKey,
        collection: CollectionKind,
        location: &SourceLocation,
    ) -> &mut Pending<T> {
        match self.pending.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Pending {
                collection,
                declared: None,
                first_location: location.clone(),
                candidates: Vec::new(),
            }),
        }
    }

    /// Resolves overrides and freezes every multibinding.
    ///
    /// Contributions with the same signature override each other: the one
    /// declared closest to the graph wins. Same-signature contributions at the
    /// same depth, and map contributions sharing a map key, are duplicates.
    pub fn freeze(self) -> BTreeMap<TypeKey, Frozen<T>> {
        self.pending
            .into_iter()
            .map(|(key, pending)| (key, Self::freeze_one(pending)))
            .collect()
    }

    fn freeze_one(pending: Pending<T>) -> Frozen<T> {
        let mut duplicates = Vec::new();
        let mut by_signature: BTreeMap<String, Vec<Candidate<T>>> = BTreeMap::new();
        let mut order = Vec::new();
        for candidate in pending.candidates {
            if !by_signature.contains_key(&candidate.signature) {
                order.push(candidate.signature.clone());
            }
            by_signature
                .entry(candidate.signature.clone())
                .or_default()
                .push(candidate);
        }

        let mut winners: Vec<Candidate<T>> = Vec::with_capacity(order.len());
        for signature in order {
            let Some(group) = by_signature.remove(&signature) else {
                continue;
            };
            let Some(depth) = group.iter().map(|candidate| candidate.depth).min() else {
                continue;
            };
            let mut closest = group.into_iter().filter(|candidate| candidate.depth == depth);
            if let Some(winner) = closest.next() {
                if closest.next().is_some() {
                    duplicates.push(signature);
                }
                winners.push(winner);
            }
        }

        let mut map_keys: HashMap<&str, usize> = HashMap::new();
        for winner in &winners {
            if let ContributionKind::IntoMap { key, .. } = &winner.contribution.kind {
                *map_keys.entry(key.as_str()).or_default() += 1;
            }
        }
        let mut duplicated_keys: Vec<String> = map_keys
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| format!("map key {key}"))
            .collect();
        duplicated_keys.sort();
        duplicates.extend(duplicated_keys);

        let (allow_empty, location) = match pending.declared {
            Some((allow_empty, location)) => (allow_empty, location),
            None => (false, pending.first_location),
        };
        let (contributions, winners) = winners
            .into_iter()
            .map(|candidate| (candidate.contribution, candidate.item))
            .unzip();
        Frozen {
            shape: MultibindingShape {
                collection: pending.collection,
                contributions,
                allow_empty,
                duplicates,
            },
            location,
            winners,
        }
    }
}
