//! Drives resolution and generation for every graph of a compilation pass.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use snafu::prelude::*;
use tracing::{debug, instrument, warn};

use crate::codegen::{CodeGenerator, GenerationError, GraphReport, ResolvedGraph};
use crate::context::ResolutionContext;
use crate::decl::GraphDecl;
use crate::diagnostics::{DiagnosticKind, DiagnosticReporter};
use crate::error::{GraphError, GraphErrors, StructuralError};
use crate::graph::{sort, validate, BindingGraph, BindingGraphBuilder};
use crate::metadata::ModuleMetadata;
use crate::registry::Configurer;
use crate::types::ClassId;

/// Why a graph was abandoned.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ProcessError {
    #[snafu(display("graph {graph} has a malformed declaration"))]
    #[non_exhaustive]
    Structural {
        graph: ClassId,
        source: StructuralError,
    },
    #[snafu(display("graph {graph} is inconsistent"))]
    #[non_exhaustive]
    Inconsistent {
        graph: ClassId,
        source: GraphErrors,
    },
    #[snafu(display("graph {graph} extends {parent}, which could not be resolved"))]
    #[non_exhaustive]
    ParentUnavailable { graph: ClassId, parent: ClassId },
    #[snafu(display("could not generate code for graph {graph}"))]
    #[non_exhaustive]
    Generation {
        graph: ClassId,
        source: GenerationError,
    },
}

/// The outcome of one compilation pass.
#[derive(Debug, Default)]
pub struct ProcessSummary {
    pub generated: Vec<ClassId>,
    pub abandoned: Vec<ClassId>,
    /// Only filled when graph reports are enabled.
    pub reports: Vec<GraphReport>,
}

/// Resolves, validates, sorts and generates graphs.
///
/// A failing graph is reported and abandoned without affecting its siblings.
/// Graphs extending an abandoned graph are abandoned as well.
pub struct Processor<'a> {
    context: &'a ResolutionContext,
    reporter: &'a mut dyn DiagnosticReporter,
    generator: &'a mut dyn CodeGenerator,
    completed: BTreeMap<ClassId, Arc<BindingGraph>>,
}

impl<'a> Processor<'a> {
    pub fn new(
        context: &'a ResolutionContext,
        reporter: &'a mut dyn DiagnosticReporter,
        generator: &'a mut dyn CodeGenerator,
    ) -> Self {
        Self {
            context,
            reporter,
            generator,
            completed: BTreeMap::new(),
        }
    }

    pub fn process(&mut self, graphs: &[GraphDecl]) -> ProcessSummary {
        let mut summary = ProcessSummary::default();
        if !self.context.options().enabled {
            debug!("processing is disabled");
            return summary;
        }

        for decl in parents_first(graphs) {
            match self.process_one(decl) {
                Ok(resolved) => {
                    if self.context.options().reports_enabled {
                        summary.reports.push(resolved.report());
                    }
                    summary.generated.push(decl.id.clone());
                }
                Err(err) => {
                    warn!(graph = %decl.id, "abandoned graph: {err}");
                    self.report_failure(decl, &err);
                    summary.abandoned.push(decl.id.clone());
                }
            }
        }
        debug!(
            generated = summary.generated.len(),
            abandoned = summary.abandoned.len(),
            "processed graphs"
        );
        summary
    }

    fn process_one(&mut self, decl: &GraphDecl) -> Result<ResolvedGraph, ProcessError> {
        let parent = match &decl.parent {
            Some(parent) => match self.completed.get(parent) {
                Some(graph) => Some(Arc::clone(graph)),
                None => {
                    return ParentUnavailableSnafu {
                        graph: decl.id.clone(),
                        parent: parent.clone(),
                    }
                    .fail()
                }
            },
            None => None,
        };

        let resolved = self.process_graph(decl, parent)?;
        self.generator
            .generate(&resolved)
            .context(GenerationSnafu {
                graph: decl.id.clone(),
            })?;
        self.completed
            .insert(decl.id.clone(), resolved.shared_graph());
        Ok(resolved)
    }

    /// Resolves one graph up to the point where code can be generated.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed declaration, or with every inconsistency
    /// found in the graph.
    #[instrument(skip_all, fields(graph = %decl.id))]
    pub fn process_graph(
        &self,
        decl: &GraphDecl,
        parent: Option<Arc<BindingGraph>>,
    ) -> Result<ResolvedGraph, ProcessError> {
        let graph = decl.id.clone();
        let providers = Configurer::configure(decl, self.context)
            .context(StructuralSnafu {
                graph: graph.clone(),
            })?
            .finish()
            .map_err(|errors| inconsistent(&graph, errors))?;

        let expansion = BindingGraphBuilder::new(decl, providers, parent, self.context)
            .and_then(BindingGraphBuilder::expand)
            .context(StructuralSnafu {
                graph: graph.clone(),
            })?;
        let mut errors = expansion.errors;
        errors.extend(validate(&expansion.graph, &expansion.cycles));
        if !errors.is_empty() {
            return Err(inconsistent(&graph, errors));
        }

        let sorted = sort(&expansion.graph);
        debug!(bindings = sorted.order.len(), "resolved graph");
        Ok(ResolvedGraph::new(Arc::new(expansion.graph), sorted))
    }

    /// Records the factories of every graph generated so far.
    pub fn metadata(&self, module: &str) -> ModuleMetadata {
        ModuleMetadata::from_graphs(module, self.completed.values().map(Arc::as_ref))
    }

    pub fn completed(&self, id: &ClassId) -> Option<&Arc<BindingGraph>> {
        self.completed.get(id)
    }

    fn report_failure(&mut self, decl: &GraphDecl, err: &ProcessError) {
        match err {
            ProcessError::Structural { source, .. } => {
                self.reporter.report(
                    source.location(),
                    DiagnosticKind::Structural,
                    &source.to_string(),
                );
            }
            ProcessError::Inconsistent { source, .. } => {
                for error in &source.errors {
                    self.reporter
                        .report(error.location(), error.kind(), &error.to_string());
                }
            }
            ProcessError::ParentUnavailable { .. } => {
                self.reporter.report(
                    &decl.location,
                    DiagnosticKind::ParentGraphUnavailable,
                    &err.to_string(),
                );
            }
            ProcessError::Generation { source, .. } => {
                self.reporter.report(
                    &decl.location,
                    DiagnosticKind::Generation,
                    &format!("{err}: {source}"),
                );
            }
        }
    }
}

fn inconsistent(graph: &ClassId, errors: Vec<GraphError>) -> ProcessError {
    ProcessError::Inconsistent {
        graph: graph.clone(),
        source: GraphErrors { errors },
    }
}

/// Orders graphs so that every parent declared in `graphs` comes before its
/// children. Otherwise declaration order is kept.
fn parents_first(graphs: &[GraphDecl]) -> Vec<&GraphDecl> {
    let by_id: HashMap<&ClassId, &GraphDecl> = graphs.iter().map(|graph| (&graph.id, graph)).collect();
    let mut ordered = Vec::with_capacity(graphs.len());
    let mut visited: HashSet<&ClassId> = HashSet::new();

    for graph in graphs {
        let mut chain = Vec::new();
        let mut current = Some(graph);
        while let Some(decl) = current {
            if !visited.insert(&decl.id) {
                break;
            }
            chain.push(decl);
            current = decl.parent.as_ref().and_then(|parent| by_id.get(parent).copied());
        }
        ordered.extend(chain.into_iter().rev());
    }
    ordered
}

#[cfg(test)]
mod tests {
    use mockall::predicate::*;
    use tracing_test::traced_test;

    use crate::codegen::MockCodeGenerator;
    use crate::decl::dsl::{graph, param, provides, ty};
    use crate::decl::ClassIndex;
    use crate::diagnostics::{CollectingReporter, MockDiagnosticReporter};
    use crate::options::Options;

    use super::*;

    fn string_graph(id: &str) -> GraphDecl {
        let mut decl = graph(id).accessor("value", ty("kotlin.String")).build();
        provides(id, "provideString")
            .returns(ty("kotlin.String"))
            .in_object()
            .set_on(&mut decl);
        decl
    }

    fn cyclic_graph(id: &str) -> GraphDecl {
        let mut decl = graph(id).accessor("value", ty("kotlin.Int")).build();
        provides(id, "provideInt")
            .param(param("value", ty("kotlin.Int")))
            .returns(ty("kotlin.Int"))
            .in_object()
            .set_on(&mut decl);
        decl
    }

    fn accepting_generator() -> MockCodeGenerator {
        let mut generator = MockCodeGenerator::new();
        generator.expect_generate().returning(|_| Ok(()));
        generator
    }

    #[test]
    fn processor_process_succeeds() {
        let context = ResolutionContext::new(Options::default(), ClassIndex::new());
        let mut reporter = MockDiagnosticReporter::new();
        reporter.expect_report().never();
        let mut generator = accepting_generator();

        let mut processor = Processor::new(&context, &mut reporter, &mut generator);
        let summary = processor.process(&[string_graph("test.AppGraph")]);
        assert_eq!(summary.generated, [ClassId::new("test.AppGraph")]);
        assert!(summary.abandoned.is_empty());
        assert!(summary.reports.is_empty());
        assert!(processor.completed(&ClassId::new("test.AppGraph")).is_some());
    }

    #[test]
    #[traced_test]
    fn processor_process_fails_when_graph_has_cycle() {
        let context = ResolutionContext::new(Options::default(), ClassIndex::new());
        let mut reporter = MockDiagnosticReporter::new();
        reporter
            .expect_report()
            .with(always(), eq(DiagnosticKind::DependencyCycle), always())
            .times(1)
            .return_const(());
        let mut generator = MockCodeGenerator::new();
        generator
            .expect_generate()
            .withf(|graph| graph.graph().id().as_str() == "test.OtherGraph")
            .times(1)
            .returning(|_| Ok(()));

        let mut processor = Processor::new(&context, &mut reporter, &mut generator);
        let summary = processor.process(&[
            cyclic_graph("test.AppGraph"),
            string_graph("test.OtherGraph"),
        ]);
        assert_eq!(summary.abandoned, [ClassId::new("test.AppGraph")]);
        assert_eq!(summary.generated, [ClassId::new("test.OtherGraph")]);
        assert!(logs_contain("abandoned graph"));
    }

    #[test]
    fn processor_process_fails_when_parent_is_abandoned() {
        let context = ResolutionContext::new(Options::default(), ClassIndex::new());
        let mut reporter = CollectingReporter::new();
        let mut generator = accepting_generator();
        let child = {
            let mut decl = string_graph("test.ChildGraph");
            decl.parent = Some(ClassId::new("test.AppGraph"));
            decl
        };

        let summary = Processor::new(&context, &mut reporter, &mut generator)
            .process(&[child, cyclic_graph("test.AppGraph")]);
        assert_eq!(
            summary.abandoned,
            [ClassId::new("test.AppGraph"), ClassId::new("test.ChildGraph")]
        );
        assert_eq!(
            reporter
                .of_kind(DiagnosticKind::ParentGraphUnavailable)
                .count(),
            1
        );
    }

    #[test]
    fn processor_process_fails_when_generation_fails() {
        let context = ResolutionContext::new(Options::default(), ClassIndex::new());
        let mut reporter = CollectingReporter::new();
        let mut generator = MockCodeGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Err("disk full".into()));

        let summary = Processor::new(&context, &mut reporter, &mut generator)
            .process(&[string_graph("test.AppGraph")]);
        assert_eq!(summary.abandoned, [ClassId::new("test.AppGraph")]);
        let diagnostic = reporter.of_kind(DiagnosticKind::Generation).next().unwrap();
        assert!(diagnostic.message.ends_with("disk full"));
    }

    #[test]
    fn processor_process_succeeds_when_disabled() {
        let options = Options {
            enabled: false,
            ..Options::default()
        };
        let context = ResolutionContext::new(options, ClassIndex::new());
        let mut reporter = MockDiagnosticReporter::new();
        reporter.expect_report().never();
        let mut generator = MockCodeGenerator::new();
        generator.expect_generate().never();

        let summary = Processor::new(&context, &mut reporter, &mut generator)
            .process(&[cyclic_graph("test.AppGraph")]);
        assert!(summary.generated.is_empty());
        assert!(summary.abandoned.is_empty());
    }

    #[test]
    fn processor_process_succeeds_when_reports_are_enabled() {
        let options = Options {
            reports_enabled: true,
            ..Options::default()
        };
        let context = ResolutionContext::new(options, ClassIndex::new());
        let mut reporter = CollectingReporter::new();
        let mut generator = accepting_generator();

        let summary = Processor::new(&context, &mut reporter, &mut generator)
            .process(&[string_graph("test.AppGraph")]);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].graph, "test.AppGraph");
    }
}
