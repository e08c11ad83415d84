use serde::Deserialize;
use snafu::prelude::*;

use crate::types::ClassId;

/// Ids of the runtime annotations and wrapper types used by default.
pub mod ids {
    pub const INJECT: &str = "bindgraph.runtime.Inject";
    pub const ASSISTED_INJECT: &str = "bindgraph.runtime.AssistedInject";
    pub const ASSISTED: &str = "bindgraph.runtime.Assisted";
    pub const ASSISTED_FACTORY: &str = "bindgraph.runtime.AssistedFactory";
    pub const QUALIFIER: &str = "bindgraph.runtime.Qualifier";
    pub const SCOPE: &str = "bindgraph.runtime.Scope";
    pub const NAMED: &str = "bindgraph.runtime.Named";
    pub const SINGLE_IN: &str = "bindgraph.runtime.SingleIn";
    pub const PROVIDER: &str = "bindgraph.runtime.Provider";
    pub const LAZY: &str = "kotlin.Lazy";
    pub const MEMBERS_INJECTOR: &str = "bindgraph.runtime.MembersInjector";
    pub const MULTIBINDING_ELEMENT: &str = "bindgraph.internal.MultibindingElement";
    pub const SET: &str = "kotlin.collections.Set";
    pub const MAP: &str = "kotlin.collections.Map";
}

/// Plugin options. Every list accepts custom annotations next to the runtime
/// ones, so projects migrating from another framework can keep theirs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Options {
    pub enabled: bool,
    pub reports_enabled: bool,
    pub inject_annotations: Vec<ClassId>,
    pub assisted_inject_annotations: Vec<ClassId>,
    pub assisted_annotations: Vec<ClassId>,
    pub assisted_factory_annotations: Vec<ClassId>,
    /// Meta-annotations marking an annotation class as a qualifier.
    pub qualifier_annotations: Vec<ClassId>,
    /// Meta-annotations marking an annotation class as a scope.
    pub scope_annotations: Vec<ClassId>,
    /// Qualifiers known without a class declaration.
    pub builtin_qualifiers: Vec<ClassId>,
    /// Scopes known without a class declaration.
    pub builtin_scopes: Vec<ClassId>,
    pub provider_types: Vec<ClassId>,
    pub lazy_types: Vec<ClassId>,
    pub members_injector: ClassId,
    pub multibinding_element: ClassId,
    pub set_type: ClassId,
    pub map_type: ClassId,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            enabled: true,
            reports_enabled: false,
            inject_annotations: vec![ClassId::new(ids::INJECT)],
            assisted_inject_annotations: vec![ClassId::new(ids::ASSISTED_INJECT)],
            assisted_annotations: vec![ClassId::new(ids::ASSISTED)],
            assisted_factory_annotations: vec![ClassId::new(ids::ASSISTED_FACTORY)],
            qualifier_annotations: vec![ClassId::new(ids::QUALIFIER)],
            scope_annotations: vec![ClassId::new(ids::SCOPE)],
            builtin_qualifiers: vec![ClassId::new(ids::NAMED)],
            builtin_scopes: vec![ClassId::new(ids::SINGLE_IN)],
            provider_types: vec![ClassId::new(ids::PROVIDER)],
            lazy_types: vec![ClassId::new(ids::LAZY)],
            members_injector: ClassId::new(ids::MEMBERS_INJECTOR),
            multibinding_element: ClassId::new(ids::MULTIBINDING_ELEMENT),
            set_type: ClassId::new(ids::SET),
            map_type: ClassId::new(ids::MAP),
        }
    }
}

impl Options {
    /// Reads options from a JSON document. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_str(json).context(MalformedSnafu)?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), OptionsError> {
        let required = [
            ("inject-annotations", &self.inject_annotations),
            ("qualifier-annotations", &self.qualifier_annotations),
            ("scope-annotations", &self.scope_annotations),
            ("provider-types", &self.provider_types),
            ("lazy-types", &self.lazy_types),
        ];
        for (option, values) in required {
            ensure!(!values.is_empty(), EmptySnafu { option });
        }
        Ok(())
    }

    pub fn is_inject(&self, id: &ClassId) -> bool {
        self.inject_annotations.contains(id)
    }

    pub fn is_assisted_inject(&self, id: &ClassId) -> bool {
        self.assisted_inject_annotations.contains(id)
    }

    pub fn is_assisted(&self, id: &ClassId) -> bool {
        self.assisted_annotations.contains(id)
    }

    pub fn is_assisted_factory(&self, id: &ClassId) -> bool {
        self.assisted_factory_annotations.contains(id)
    }

    pub fn is_provider_type(&self, id: &ClassId) -> bool {
        self.provider_types.contains(id)
    }

    pub fn is_lazy_type(&self, id: &ClassId) -> bool {
        self.lazy_types.contains(id)
    }
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum OptionsError {
    #[snafu(display("could not parse the plugin options"))]
    #[non_exhaustive]
    Malformed { source: serde_json::Error },
    #[snafu(display("the option {option} requires at least one value"))]
    #[non_exhaustive]
    Empty { option: &'static str },
}
