use snafu::prelude::*;

use crate::binding::{Binding, BindingKind, Dependency, Provenance};
use crate::context::ResolutionContext;
use crate::decl::{BindsDecl, ProviderDecl};
use crate::error::{
    GenericProviderSnafu, InvalidBindsAritySnafu, StructuralError, UnrelatedBindsTypesSnafu,
};
use crate::key::{self, ContextualTypeKey, TypeKey};
use crate::scope::{Lifetime, ScopeAnnotation};
use crate::types::{ClassId, TypeRef};

/// Builds the binding of a provider function or property under `key`, which is
/// its return type key or, for contributions, the element key.
///
/// Providers declared outside of an object and outside of the graph type
/// hierarchy need an instance of their owner, which becomes the first
/// dependency.
pub fn provided_binding(
    decl: &ProviderDecl,
    key: TypeKey,
    graph: &ClassId,
    context: &ResolutionContext,
) -> Result<Binding, StructuralError> {
    ensure!(
        decl.type_parameters.is_empty(),
        GenericProviderSnafu {
            callable: decl.callable.to_string(),
            location: decl.location.clone(),
        }
    );

    let owner = &decl.callable.owner;
    let has_receiver =
        !decl.owner_is_object && owner != graph && !context.classes().is_subtype(graph, owner);
    let mut dependencies = Vec::with_capacity(decl.parameters.len() + 1);
    if has_receiver {
        dependencies.push(Dependency::new(
            key::of(TypeRef::class(owner.clone())).into(),
            Provenance::new(format!("{} receiver", decl.callable), decl.location.clone()),
        ));
    }
    for param in &decl.parameters {
        dependencies.push(Dependency::new(
            ContextualTypeKey::from_declaration(param, context)?,
            Provenance::new(
                format!("{}({})", decl.callable, param.name),
                param.location.clone(),
            ),
        ));
    }

    Ok(Binding::new(
        key,
        BindingKind::Provided {
            callable: decl.callable.clone(),
            has_receiver,
        },
        Provenance::new(decl.callable.to_string(), decl.location.clone()),
    )
    .with_dependencies(dependencies)
    .with_lifetime(Lifetime::from(ScopeAnnotation::find(
        &decl.annotations,
        context,
    ))))
}

/// Builds the binding of a binds declaration, which reuses the binding of its
/// single parameter for `key`.
pub fn alias_binding(
    decl: &BindsDecl,
    key: TypeKey,
    context: &ResolutionContext,
) -> Result<Binding, StructuralError> {
    let [param] = decl.parameters.as_slice() else {
        return InvalidBindsAritySnafu {
            callable: decl.callable.to_string(),
            arity: decl.parameters.len(),
            location: decl.location.clone(),
        }
        .fail();
    };

    if let (Some(from), Some(to)) = (param.ty.class_id(), decl.return_type.class_id()) {
        let classes = context.classes();
        let both_known = classes.contains(from) && classes.contains(to);
        ensure!(
            !both_known || classes.is_subtype(from, to),
            UnrelatedBindsTypesSnafu {
                callable: decl.callable.to_string(),
                from: param.ty.to_string(),
                to: decl.return_type.to_string(),
                location: decl.location.clone(),
            }
        );
    }

    let target = TypeKey::from_declaration(param, context)?;
    let site = Provenance::new(
        format!("{}({})", decl.callable, param.name),
        param.location.clone(),
    );
    Ok(Binding::new(
        key,
        BindingKind::Alias {
            target: target.clone(),
        },
        Provenance::new(decl.callable.to_string(), decl.location.clone()),
    )
    .with_dependencies(vec![Dependency::new(target.into(), site)])
    .with_lifetime(Lifetime::from(ScopeAnnotation::find(
        &decl.annotations,
        context,
    ))))
}
