use bindgraph::binding::{BindingKind, FactoryRef};
use bindgraph::decl::dsl::{
    assisted_factory, assisted_inject, class, constructor, generic, graph, inject, param,
    provides, single_in, ty,
};
use bindgraph::options::ids;
use bindgraph::prelude::*;

#[derive(Default)]
struct RecordingGenerator {
    generated: Vec<String>,
}

impl CodeGenerator for RecordingGenerator {
    fn generate(&mut self, graph: &ResolvedGraph) -> Result<(), GenerationError> {
        self.generated.push(graph.graph().id().to_string());
        Ok(())
    }
}

fn run(
    context: &ResolutionContext,
    graphs: &[GraphDecl],
) -> (ProcessSummary, CollectingReporter, RecordingGenerator) {
    let mut reporter = CollectingReporter::new();
    let mut generator = RecordingGenerator::default();
    let summary = Processor::new(context, &mut reporter, &mut generator).process(graphs);
    (summary, reporter, generator)
}

fn empty_context() -> ResolutionContext {
    ResolutionContext::new(Options::default(), ClassIndex::new())
}

#[test]
fn provided_chain_succeeds() {
    let mut app = graph("test.AppGraph")
        .accessor("value", ty("kotlin.CharSequence"))
        .build();
    provides("test.AppGraph", "provideString")
        .returns(ty("kotlin.String"))
        .in_object()
        .set_on(&mut app);
    provides("test.AppGraph", "provideCharSequence")
        .param(param("s", ty("kotlin.String")))
        .returns(ty("kotlin.CharSequence"))
        .in_object()
        .set_on(&mut app);

    let context = empty_context();
    let mut reporter = CollectingReporter::new();
    let mut generator = RecordingGenerator::default();
    let processor = Processor::new(&context, &mut reporter, &mut generator);
    let resolved = processor.process_graph(&app, None).unwrap();

    let string = key::of(ty("kotlin.String"));
    let sequence = key::of(ty("kotlin.CharSequence"));
    assert_eq!(resolved.graph().len(), 2);
    let dependencies: Vec<&TypeKey> = resolved
        .binding_for(&sequence)
        .unwrap()
        .dependencies()
        .iter()
        .map(|dependency| dependency.key())
        .collect();
    assert_eq!(dependencies, [&string]);

    let order: Vec<&TypeKey> = resolved.ordered_bindings().map(|binding| binding.key()).collect();
    assert_eq!(order, [&string, &sequence]);
}

#[test]
fn provided_chain_fails_when_provider_requests_itself() {
    let mut app = graph("test.AppGraph").accessor("value", ty("kotlin.Int")).build();
    provides("test.AppGraph", "provideInt")
        .param(param("value", ty("kotlin.Int")))
        .returns(ty("kotlin.Int"))
        .in_object()
        .set_on(&mut app);

    let (summary, reporter, generator) = run(&empty_context(), &[app]);
    assert_eq!(summary.abandoned, [ClassId::new("test.AppGraph")]);
    assert!(generator.generated.is_empty());

    let cycles: Vec<_> = reporter.of_kind(DiagnosticKind::DependencyCycle).collect();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].message.contains("kotlin.Int"));
    assert!(cycles[0].message.contains("AppGraph.provideInt(value)"));
}

#[test]
fn scoped_binding_fails_when_graph_is_unscoped() {
    let mut app = graph("test.AppGraph").accessor("v", ty("kotlin.String")).build();
    provides("test.AppGraph", "provideString")
        .returns(ty("kotlin.String"))
        .within(single_in("test.AppScope"))
        .in_object()
        .set_on(&mut app);

    let (summary, reporter, generator) = run(&empty_context(), &[app]);
    assert_eq!(summary.abandoned, [ClassId::new("test.AppGraph")]);
    assert!(generator.generated.is_empty());

    let errors: Vec<_> = reporter.of_kind(DiagnosticKind::IncompatibleScope).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("kotlin.String"));
    assert!(errors[0].message.contains("test.AppScope"));
}

#[test]
fn assisted_factory_fails_when_parameter_is_missing() {
    let classes: ClassIndex = [
        class("test.Target")
            .constructor(
                constructor()
                    .primary()
                    .annotated(assisted_inject())
                    .param(param("x", ty("kotlin.Int")).assisted())
                    .param(param("y", ty("kotlin.Int")).assisted()),
            )
            .build(),
        class("test.Target.Factory")
            .interface()
            .annotated(assisted_factory())
            .factory_function("create", [param("x", ty("kotlin.Int"))], ty("test.Target"))
            .build(),
    ]
    .into_iter()
    .collect();
    let context = ResolutionContext::new(Options::default(), classes);
    let app = graph("test.AppGraph")
        .accessor("factory", ty("test.Target.Factory"))
        .build();

    let (summary, reporter, _) = run(&context, &[app]);
    assert_eq!(summary.abandoned, [ClassId::new("test.AppGraph")]);
    let errors: Vec<_> = reporter.of_kind(DiagnosticKind::AssistedMismatch).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .message
        .contains("missing from the factory: y: kotlin.Int"));
}

#[test]
fn child_graph_succeeds_when_parent_holds_scoped_binding() {
    let classes: ClassIndex = [class("test.Session")
        .annotated(inject())
        .annotated(single_in("test.AppScope"))
        .build()]
    .into_iter()
    .collect();
    let context = ResolutionContext::new(Options::default(), classes);
    let app = graph("test.AppGraph")
        .within(single_in("test.AppScope"))
        .accessor("session", ty("test.Session"))
        .build();
    let child = graph("test.UserGraph")
        .extends("test.AppGraph")
        .accessor("session", ty("test.Session"))
        .build();

    let (summary, reporter, generator) = run(&context, &[child, app]);
    assert!(reporter.is_empty(), "{:?}", reporter.diagnostics());
    assert_eq!(generator.generated, ["test.AppGraph", "test.UserGraph"]);
    assert_eq!(summary.generated.len(), 2);
}

#[test]
fn child_graph_fails_when_inherited_provider_is_missing_dependency() {
    let mut app = graph("test.AppGraph").build();
    provides("test.AppGraph", "provideFoo")
        .param(param("bar", ty("test.Bar")))
        .returns(ty("test.Foo"))
        .in_object()
        .set_on(&mut app);
    let child = graph("test.UserGraph")
        .extends("test.AppGraph")
        .accessor("foo", ty("test.Foo"))
        .build();

    let (summary, reporter, generator) = run(&empty_context(), &[child, app]);
    assert_eq!(generator.generated, ["test.AppGraph"]);
    assert_eq!(summary.abandoned, [ClassId::new("test.UserGraph")]);

    let errors: Vec<_> = reporter.of_kind(DiagnosticKind::MissingBinding).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("test.Bar"));
}

#[test]
fn child_graph_fails_when_inherited_provider_is_out_of_scope() {
    let mut app = graph("test.AppGraph").build();
    provides("test.AppGraph", "provideString")
        .returns(ty("kotlin.String"))
        .within(single_in("test.OtherScope"))
        .in_object()
        .set_on(&mut app);
    let child = graph("test.UserGraph")
        .within(single_in("test.OtherScope"))
        .extends("test.AppGraph")
        .accessor("value", ty("kotlin.String"))
        .build();

    let (summary, reporter, generator) = run(&empty_context(), &[app, child]);
    assert_eq!(generator.generated, ["test.AppGraph"]);
    assert_eq!(summary.abandoned, [ClassId::new("test.UserGraph")]);

    let errors: Vec<_> = reporter.of_kind(DiagnosticKind::IncompatibleScope).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("kotlin.String"));
    assert!(errors[0].message.contains("test.OtherScope"));
}

#[test]
fn child_graph_succeeds_when_inherited_provider_is_resolvable() {
    let mut app = graph("test.AppGraph").build();
    provides("test.AppGraph", "provideFoo")
        .param(param("bar", ty("test.Bar")))
        .returns(ty("test.Foo"))
        .in_object()
        .set_on(&mut app);
    provides("test.AppGraph", "provideBar")
        .returns(ty("test.Bar"))
        .in_object()
        .set_on(&mut app);
    let child = graph("test.UserGraph")
        .extends("test.AppGraph")
        .accessor("foo", ty("test.Foo"))
        .build();

    let context = ResolutionContext::new(
        Options {
            reports_enabled: true,
            ..Options::default()
        },
        ClassIndex::new(),
    );
    let (summary, reporter, generator) = run(&context, &[app, child]);
    assert!(reporter.is_empty(), "{:?}", reporter.diagnostics());
    assert_eq!(generator.generated, ["test.AppGraph", "test.UserGraph"]);

    let report = summary
        .reports
        .iter()
        .find(|report| report.graph == "test.UserGraph")
        .unwrap();
    let foo = report
        .bindings
        .iter()
        .find(|binding| binding.key == "test.Foo")
        .unwrap();
    assert_eq!(foo.inherited_from.as_deref(), Some("test.AppGraph"));
}

#[test]
fn multibinding_fails_when_contribution_is_duplicated() {
    let mut app = graph("test.AppGraph")
        .accessor("loggers", generic(ids::SET, [ty("test.Logger")]))
        .build();
    for _ in 0..2 {
        provides("test.AppGraph", "provideLogger")
            .returns(ty("test.Logger"))
            .into_set()
            .in_object()
            .set_on(&mut app);
    }

    let (summary, reporter, generator) = run(&empty_context(), &[app]);
    assert_eq!(summary.abandoned, [ClassId::new("test.AppGraph")]);
    assert!(generator.generated.is_empty());

    let errors: Vec<_> = reporter.of_kind(DiagnosticKind::MultibindingConflict).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("provideLogger()"));
    assert_eq!(reporter.diagnostics().len(), 1);
}

#[test]
fn metadata_succeeds_when_factory_comes_from_another_module() {
    let classes: ClassIndex = [class("test.Api")
        .constructor(constructor().primary().annotated(inject()))
        .build()]
    .into_iter()
    .collect();
    let upstream = ResolutionContext::new(Options::default(), classes);
    let network = graph("test.NetworkGraph").accessor("api", ty("test.Api")).build();

    let mut reporter = CollectingReporter::new();
    let mut generator = RecordingGenerator::default();
    let mut processor = Processor::new(&upstream, &mut reporter, &mut generator);
    processor.process(&[network]);
    let json = processor.metadata("network").to_json().unwrap();

    let metadata: MetadataIndex = [ModuleMetadata::from_json(&json).unwrap()]
        .into_iter()
        .collect();
    let downstream =
        ResolutionContext::new(Options::default(), ClassIndex::new()).with_metadata(metadata);
    let app = graph("test.AppGraph").accessor("api", ty("test.Api")).build();

    let mut reporter = CollectingReporter::new();
    let mut generator = RecordingGenerator::default();
    let resolved = Processor::new(&downstream, &mut reporter, &mut generator)
        .process_graph(&app, None)
        .unwrap();
    let binding = resolved.binding_for(&key::of(ty("test.Api"))).unwrap();
    assert!(matches!(
        binding.kind(),
        BindingKind::ConstructorInjected {
            factory: FactoryRef::External(factory),
            ..
        } if factory == "test.Api_Factory"
    ));
}
