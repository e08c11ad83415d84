use std::error::Error;

use bindgraph::codegen::Materialization;
use bindgraph::decl::dsl::{
    binds, class, constructor, generic, graph, inject, param, provides, single_in, ty,
};
use bindgraph::options::ids;
use bindgraph::prelude::*;

fn main() {
    let context = ResolutionContext::new(
        Options {
            reports_enabled: true,
            ..Options::default()
        },
        classes(),
    );
    let mut reporter = CollectingReporter::new();
    let mut generator = PlanPrinter;

    let summary = Processor::new(&context, &mut reporter, &mut generator)
        .process(&[coffee_graph(), broken_graph()]);

    for diagnostic in reporter.diagnostics() {
        eprintln!("{diagnostic}");
    }
    for report in &summary.reports {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("could not render report: {err}"),
        }
    }
}

fn classes() -> ClassIndex {
    [
        class("coffee.ElectricHeater")
            .annotated(inject())
            .annotated(single_in("coffee.AppScope"))
            .supertype(ty("coffee.Heater"))
            .build(),
        class("coffee.Thermosiphon")
            .constructor(
                constructor()
                    .primary()
                    .annotated(inject())
                    .param(param("heater", ty("coffee.Heater"))),
            )
            .supertype(ty("coffee.Pump"))
            .build(),
        class("coffee.CoffeeMaker")
            .constructor(
                constructor()
                    .primary()
                    .annotated(inject())
                    .param(param("heater", generic(ids::LAZY, [ty("coffee.Heater")])))
                    .param(param("pump", ty("coffee.Pump")))
                    .param(param(
                        "logs",
                        generic(ids::SET, [ty("coffee.CoffeeLogger")]),
                    )),
            )
            .build(),
    ]
    .into_iter()
    .collect()
}

fn coffee_graph() -> GraphDecl {
    let mut decl = graph("coffee.CoffeeShop")
        .within(single_in("coffee.AppScope"))
        .accessor("maker", ty("coffee.CoffeeMaker"))
        .accessor("heater", ty("coffee.Heater"))
        .build();
    binds("coffee.CoffeeShop", "bindHeater")
        .param(param("heater", ty("coffee.ElectricHeater")))
        .returns(ty("coffee.Heater"))
        .set_on(&mut decl);
    binds("coffee.CoffeeShop", "bindPump")
        .param(param("pump", ty("coffee.Thermosiphon")))
        .returns(ty("coffee.Pump"))
        .set_on(&mut decl);
    provides("coffee.CoffeeShop", "provideConsoleLogger")
        .returns(ty("coffee.CoffeeLogger"))
        .into_set()
        .in_object()
        .set_on(&mut decl);
    provides("coffee.CoffeeShop", "provideFileLogger")
        .returns(ty("coffee.CoffeeLogger"))
        .into_set()
        .in_object()
        .set_on(&mut decl);
    decl
}

/// Requests a pump without saying which one.
fn broken_graph() -> GraphDecl {
    graph("coffee.BrokenShop")
        .accessor("pump", ty("coffee.Pump"))
        .build()
}

/// Prints the construction plan instead of writing code.
struct PlanPrinter;

impl CodeGenerator for PlanPrinter {
    fn generate(&mut self, graph: &ResolvedGraph) -> Result<(), Box<dyn Error + Send + Sync>> {
        println!("{}:", graph.graph().id());
        for binding in graph.ordered_bindings() {
            let materialization = match graph.plan().fields.get(binding.key()) {
                Some(reason) => Materialization::Field(*reason),
                None if graph.plan().inlined.contains(binding.key()) => Materialization::Inlined,
                None => Materialization::Unused,
            };
            println!(
                "  {} ({}) {materialization:?}",
                binding.key(),
                binding.kind().to_str()
            );
        }
        Ok(())
    }
}
