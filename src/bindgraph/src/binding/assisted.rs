use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::binding::constructor::is_assisted;
use crate::binding::{
    AssistedFactoryClass, Binding, BindingKind, ClassShape, Dependency, Provenance,
};
use crate::context::ResolutionContext;
use crate::decl::ParamDecl;
use crate::error::{InvalidAssistedFactorySnafu, StructuralError};
use crate::key::{self, TypeKey};
use crate::types::{substitution_for, ClassId, Substitution, TypeRef};

/// A caller-supplied parameter, identified by its type and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssistedParameter {
    pub identifier: String,
    pub ty: TypeRef,
}

impl Display for AssistedParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.identifier, self.ty)
    }
}

/// Extracts the assisted parameters of a parameter list. The identifier is
/// the explicit value of the assisted annotation, or else the parameter name.
///
/// With `all` set, every parameter counts as assisted, as is the case for the
/// parameters of a factory function.
pub fn assisted_parameters(
    parameters: &[ParamDecl],
    all: bool,
    substitution: &Substitution,
    context: &ResolutionContext,
) -> Vec<AssistedParameter> {
    let options = context.options();
    parameters
        .iter()
        .filter(|param| all || is_assisted(param, context))
        .map(|param| {
            let explicit = param
                .annotations
                .iter()
                .filter(|annotation| options.is_assisted(&annotation.class_id))
                .find_map(|annotation| annotation.first_argument())
                .map(|identifier| identifier.trim_matches('"'))
                .filter(|identifier| !identifier.is_empty());
            AssistedParameter {
                identifier: explicit.unwrap_or(&param.name).to_string(),
                ty: param.ty.substitute(substitution),
            }
        })
        .collect()
}

/// The difference between the assisted parameters of a factory function and
/// those of its target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssistedDiff {
    /// Declared by the target but not by the factory.
    pub missing: Vec<String>,
    /// Declared by the factory but not by the target.
    pub extra: Vec<String>,
    /// Declared more than once on either side.
    pub duplicates: Vec<String>,
}

impl AssistedDiff {
    pub fn between(factory: &[AssistedParameter], target: &[AssistedParameter]) -> Self {
        fn counts(parameters: &[AssistedParameter]) -> HashMap<&AssistedParameter, usize> {
            let mut counts = HashMap::new();
            for parameter in parameters {
                *counts.entry(parameter).or_default() += 1;
            }
            counts
        }

        let factory_counts = counts(factory);
        let target_counts = counts(target);

        let mut diff = Self::default();
        for parameter in target {
            if !factory_counts.contains_key(parameter) {
                diff.missing.push(parameter.to_string());
            }
        }
        for parameter in factory {
            if !target_counts.contains_key(parameter) {
                diff.extra.push(parameter.to_string());
            }
        }
        for (parameters, counts) in [(factory, &factory_counts), (target, &target_counts)] {
            for parameter in parameters {
                let rendered = parameter.to_string();
                if counts[parameter] > 1 && !diff.duplicates.contains(&rendered) {
                    diff.duplicates.push(rendered);
                }
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.duplicates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistedShape {
    pub factory: ClassId,
    pub function: String,
    pub target: TypeKey,
    pub target_class: ClassId,
    pub factory_parameters: Vec<AssistedParameter>,
    pub target_parameters: Vec<AssistedParameter>,
}

impl AssistedShape {
    pub fn diff(&self) -> AssistedDiff {
        AssistedDiff::between(&self.factory_parameters, &self.target_parameters)
    }
}

/// Builds the binding of an assisted factory. The factory depends on its
/// target, whose graph-supplied dependencies are resolved as usual.
pub fn assisted_factory_binding(
    factory: &AssistedFactoryClass,
    key: &TypeKey,
    context: &ResolutionContext,
) -> Result<Binding, StructuralError> {
    let function = &factory.function;
    let invalid = InvalidAssistedFactorySnafu {
        class: factory.class.clone(),
        reason: "its factory function must return an assisted-inject class",
        location: factory.location.clone(),
    };

    let target_class = function.return_type.class_id().cloned();
    let target_shape = match &target_class {
        Some(class) => context.class_shape(class)?,
        None => None,
    };
    let (Some(target_class), Some(target_shape)) = (target_class, target_shape) else {
        return invalid.fail();
    };
    let ClassShape::Injectable(target) = target_shape.as_ref() else {
        return invalid.fail();
    };
    if !target.assisted {
        return invalid.fail();
    }

    let substitution = substitution_for(&target.type_parameters, function.return_type.arguments());
    let shape = AssistedShape {
        factory: factory.class.clone(),
        function: function.name.clone(),
        target: key::of(function.return_type.clone()),
        target_class,
        factory_parameters: assisted_parameters(
            &function.parameters,
            true,
            &Substitution::new(),
            context,
        ),
        target_parameters: assisted_parameters(&target.parameters, false, &substitution, context),
    };
    let dependency = Dependency::new(
        shape.target.clone().into(),
        Provenance::new(
            format!("{}.{}", factory.class.short_name(), function.name),
            function.location.clone(),
        ),
    );
    Ok(Binding::new(
        key.clone(),
        BindingKind::Assisted(shape),
        Provenance::new(
            format!("assisted factory {}", factory.class),
            factory.location.clone(),
        ),
    )
    .with_dependencies(vec![dependency]))
}
