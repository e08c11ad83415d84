use snafu::prelude::*;

use crate::binding::{Binding, BindingKind, Dependency, FactoryRef, Provenance};
use crate::context::ResolutionContext;
use crate::decl::{
    Annotation, ClassDecl, ClassKind, ConstructorDecl, FunctionDecl, MemberDecl, Modality,
    ParamDecl,
};
use crate::diagnostics::SourceLocation;
use crate::error::{
    IneligibleInjectClassSnafu, InjectOnClassAndConstructorSnafu, InvalidAssistedFactorySnafu,
    MultipleInjectConstructorsSnafu, StructuralError,
};
use crate::key::{ContextualTypeKey, TypeKey};
use crate::metadata::FactoryRecord;
use crate::scope::{Lifetime, ScopeAnnotation};
use crate::types::{substitution_for, ClassId, Substitution};

/// How a class takes part in constructor injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassShape {
    /// An injectable singleton object.
    Object {
        class: ClassId,
        location: SourceLocation,
    },
    Injectable(InjectableClass),
    AssistedFactory(AssistedFactoryClass),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectableClass {
    pub class: ClassId,
    pub type_parameters: Vec<String>,
    pub parameters: Vec<ParamDecl>,
    pub members: Vec<MemberDecl>,
    pub scope: Option<ScopeAnnotation>,
    /// The constructor has caller-supplied parameters.
    pub assisted: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistedFactoryClass {
    pub class: ClassId,
    pub function: FunctionDecl,
    pub location: SourceLocation,
}

/// Classifies a class declaration, re-checking the shape rules of injected
/// classes.
///
/// Returns `Ok(None)` for classes which are simply not injectable.
pub fn analyze_class(
    class: &ClassDecl,
    context: &ResolutionContext,
) -> Result<Option<ClassShape>, StructuralError> {
    let options = context.options();
    if class
        .annotations
        .iter()
        .any(|annotation| options.is_assisted_factory(&annotation.class_id))
    {
        return analyze_assisted_factory(class).map(Some);
    }

    let is_inject = |annotation: &Annotation| {
        options.is_inject(&annotation.class_id) || options.is_assisted_inject(&annotation.class_id)
    };
    let on_class = class.annotations.iter().find(|annotation| is_inject(annotation));
    let on_constructors: Vec<&ConstructorDecl> = class
        .constructors
        .iter()
        .filter(|constructor| constructor.annotations.iter().any(is_inject))
        .collect();

    ensure!(
        on_constructors.len() <= 1,
        MultipleInjectConstructorsSnafu {
            class: class.id.clone(),
            location: class.location.clone(),
        }
    );

    let (constructor, assisted) = match (on_class, on_constructors.first()) {
        (None, None) => return Ok(None),
        (Some(_), Some(_)) => {
            return InjectOnClassAndConstructorSnafu {
                class: class.id.clone(),
                location: class.location.clone(),
            }
            .fail();
        }
        (Some(annotation), None) => (
            class.primary_constructor(),
            options.is_assisted_inject(&annotation.class_id),
        ),
        (None, Some(constructor)) => (
            Some(*constructor),
            constructor
                .annotations
                .iter()
                .any(|annotation| options.is_assisted_inject(&annotation.class_id)),
        ),
    };

    if class.kind == ClassKind::Object {
        return Ok(Some(ClassShape::Object {
            class: class.id.clone(),
            location: class.location.clone(),
        }));
    }
    check_eligible(class)?;

    Ok(Some(ClassShape::Injectable(InjectableClass {
        class: class.id.clone(),
        type_parameters: class.type_parameters.clone(),
        parameters: constructor
            .map(|constructor| constructor.parameters.clone())
            .unwrap_or_default(),
        members: context.injected_members(&class.id),
        scope: ScopeAnnotation::find(&class.annotations, context),
        assisted,
        location: class.location.clone(),
    })))
}

fn analyze_assisted_factory(class: &ClassDecl) -> Result<ClassShape, StructuralError> {
    ensure!(
        class.kind == ClassKind::Interface || class.modality == Modality::Abstract,
        InvalidAssistedFactorySnafu {
            class: class.id.clone(),
            reason: "it must be an interface or an abstract class",
            location: class.location.clone(),
        }
    );
    let function = class
        .factory_function
        .clone()
        .context(InvalidAssistedFactorySnafu {
            class: class.id.clone(),
            reason: "it must declare exactly one abstract factory function",
            location: class.location.clone(),
        })?;
    Ok(ClassShape::AssistedFactory(AssistedFactoryClass {
        class: class.id.clone(),
        function,
        location: class.location.clone(),
    }))
}

fn check_eligible(class: &ClassDecl) -> Result<(), StructuralError> {
    let reason = if matches!(class.kind, ClassKind::Interface | ClassKind::AnnotationClass) {
        Some("an interface")
    } else if class.modality == Modality::Abstract {
        Some("abstract")
    } else if matches!(class.modality, Modality::Open | Modality::Sealed) {
        Some("not final")
    } else if class.is_local {
        Some("a local class")
    } else if !class.visibility.is_at_least_internal() {
        Some("not visible to generated code")
    } else {
        None
    };
    match reason {
        Some(reason) => IneligibleInjectClassSnafu {
            class: class.id.clone(),
            reason,
            location: class.location.clone(),
        }
        .fail(),
        None => Ok(()),
    }
}

/// Builds the binding of a constructor-injected class specialized for `key`.
/// Assisted parameters are left to the caller of the assisted factory.
pub fn constructor_binding(
    shape: &InjectableClass,
    key: &TypeKey,
    context: &ResolutionContext,
) -> Result<Binding, StructuralError> {
    let substitution = substitution_for(&shape.type_parameters, key.ty().arguments());
    let short_name = shape.class.short_name();
    let mut dependencies = Vec::with_capacity(shape.parameters.len() + shape.members.len());

    for param in &shape.parameters {
        if is_assisted(param, context) {
            continue;
        }
        dependencies.push(Dependency::new(
            request_of(param, &substitution, context)?,
            Provenance::new(
                format!("{short_name}({})", param.name),
                param.location.clone(),
            ),
        ));
    }
    dependencies.extend(member_dependencies(short_name, &shape.members, &substitution, context)?);

    let provenance = Provenance::new(
        format!("{} constructor", shape.class),
        shape.location.clone(),
    );
    Ok(Binding::new(
        key.clone(),
        BindingKind::ConstructorInjected {
            class: shape.class.clone(),
            factory: FactoryRef::Local,
            assisted: shape.assisted,
        },
        provenance,
    )
    .with_dependencies(dependencies)
    .with_lifetime(Lifetime::from(shape.scope.clone())))
}

/// Builds the binding of `MembersInjector<T>` for class `class`.
pub fn members_injector_binding(
    class: &ClassId,
    key: &TypeKey,
    context: &ResolutionContext,
) -> Result<Binding, StructuralError> {
    let members = context.injected_members(class);
    let dependencies =
        member_dependencies(class.short_name(), &members, &Substitution::new(), context)?;
    let location = context
        .classes()
        .get(class)
        .map(|class| class.location.clone())
        .unwrap_or_default();
    Ok(Binding::new(
        key.clone(),
        BindingKind::MembersInjected {
            class: class.clone(),
        },
        Provenance::new(format!("members of {class}"), location),
    )
    .with_dependencies(dependencies))
}

/// Builds the binding of a class whose factory was generated by an upstream
/// module.
pub fn external_binding(record: &FactoryRecord) -> Binding {
    let class = record
        .key
        .class_id()
        .cloned()
        .unwrap_or_else(|| ClassId::new(record.key.as_str()));
    let site = Provenance::new(record.factory.clone(), SourceLocation::default());
    let dependencies = record
        .dependencies
        .iter()
        .map(|request| Dependency::new(request.clone(), site.clone()))
        .collect();
    Binding::new(
        record.key.clone(),
        BindingKind::ConstructorInjected {
            class,
            factory: FactoryRef::External(record.factory.clone()),
            assisted: false,
        },
        site,
    )
    .with_dependencies(dependencies)
    .with_lifetime(Lifetime::from(record.scope.clone()))
}

pub(crate) fn object_binding(class: &ClassId, key: &TypeKey, location: &SourceLocation) -> Binding {
    Binding::new(
        key.clone(),
        BindingKind::ObjectClass {
            class: class.clone(),
        },
        Provenance::new(format!("object {class}"), location.clone()),
    )
}

pub(crate) fn is_assisted(param: &ParamDecl, context: &ResolutionContext) -> bool {
    param
        .annotations
        .iter()
        .any(|annotation| context.options().is_assisted(&annotation.class_id))
}

fn request_of(
    param: &ParamDecl,
    substitution: &Substitution,
    context: &ResolutionContext,
) -> Result<ContextualTypeKey, StructuralError> {
    ContextualTypeKey::from_parts(
        &param.ty.substitute(substitution),
        &param.annotations,
        &param.location,
        param.has_default,
        context,
    )
}

fn member_dependencies(
    owner: &str,
    members: &[MemberDecl],
    substitution: &Substitution,
    context: &ResolutionContext,
) -> Result<Vec<Dependency>, StructuralError> {
    members
        .iter()
        .map(|member| {
            let request = ContextualTypeKey::from_parts(
                &member.ty.substitute(substitution),
                &member.annotations,
                &member.location,
                false,
                context,
            )?;
            Ok(Dependency::new(
                request,
                Provenance::new(format!("{owner}.{}", member.name), member.location.clone()),
            ))
        })
        .collect()
}
