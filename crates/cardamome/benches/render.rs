//! Benchmarks for template execution
//!
//! Run with: cargo bench --bench render
//!
//! Benchmarks cover:
//! - Text and expression output
//! - Loops with nested conditionals
//! - Contribution chains around every iteration
//! - Conversion of string-encoded lists

use cardamome::{
    ActionElement, ActionParameter, Context, ContributionDescriptor, Engine, InMemoryLoader,
    StringWriter, TargetType, Template, TemplateElement, Value, ValueMap,
};
use divan::{Bencher, black_box};

fn main() {
    divan::main();
}

// ============================================================================
// Template generators
// ============================================================================

fn core(name: &str) -> ActionElement {
    ActionElement::new("core", name)
}

/// Template with variable interpolation
fn with_variables() -> Template {
    Template::builder("variables")
        .text("Hello, ")
        .expression("user.name")
        .text("! Welcome to ")
        .expression("site_name")
        .text(".\nYou have ")
        .expression("message_count")
        .text(" unread messages.")
        .build()
}

/// A list of items with a separator between them
fn with_loop() -> Template {
    let item = vec![
        TemplateElement::text("<li>"),
        TemplateElement::expression("item.name"),
        TemplateElement::text(": "),
        TemplateElement::expression("item.price"),
        TemplateElement::text("</li>"),
        core("if")
            .with_param("test", ActionParameter::expression("not(loop.last)"))
            .with_children(vec![TemplateElement::text("\n")])
            .into(),
    ];
    Template::builder("loop")
        .text("<ul>\n")
        .action(
            core("for-each")
                .with_param("items", ActionParameter::expression("items"))
                .with_param("var", ActionParameter::constant("item"))
                .with_children(item),
        )
        .text("\n</ul>")
        .build()
}

/// Every iteration goes through trim and catch interceptors
fn with_contributions() -> Template {
    let body = core("out")
        .with_param("value", ActionParameter::expression("concat('  ', item.name, '  ')"))
        .with_contribution(ContributionDescriptor::new("core", "trim", ActionParameter::constant("both")))
        .with_contribution(ContributionDescriptor::new("core", "catch", ActionParameter::constant("error")));
    Template::builder("contributions")
        .action(
            core("for-each")
                .with_param("items", ActionParameter::expression("items"))
                .with_param("var", ActionParameter::constant("item"))
                .with_children(vec![body.into()]),
        )
        .build()
}

fn loop_context(n: usize) -> Context<'static> {
    let mut ctx = Context::new();
    let items: Vec<Value> = (0..n)
        .map(|i| {
            let mut item = ValueMap::new();
            item.insert("name", format!("Item {i}"));
            item.insert("price", Value::F64(i as f64 * 9.99));
            Value::Map(item)
        })
        .collect();
    ctx.set_variable("items", Value::List(items));
    ctx
}

// ============================================================================
// Render benchmarks
// ============================================================================

#[divan::bench]
fn render_with_variables(bencher: Bencher) {
    let engine = Engine::builder().build();
    let template = with_variables();
    let mut user = ValueMap::new();
    user.insert("name", "Alice");

    bencher.bench(|| {
        let mut ctx = Context::new();
        ctx.set_variable("user", Value::Map(user.clone()));
        ctx.set_variable("site_name", "My Site");
        ctx.set_variable("message_count", 42i64);
        black_box(engine.render_to_string(&template, &mut ctx))
    });
}

#[divan::bench(args = [10, 100, 1000])]
fn render_loop_scaling(bencher: Bencher, iterations: usize) {
    let engine = Engine::builder().build();
    let template = with_loop();

    bencher.bench(|| {
        let mut ctx = loop_context(iterations);
        let mut out = StringWriter::new();
        black_box(engine.render(&template, &mut ctx, &mut out))
    });
}

#[divan::bench(args = [10, 100, 1000])]
fn render_contribution_scaling(bencher: Bencher, iterations: usize) {
    let engine = Engine::builder().build();
    let template = with_contributions();

    bencher.bench(|| {
        let mut ctx = loop_context(iterations);
        black_box(engine.render_to_string(&template, &mut ctx))
    });
}

#[divan::bench]
fn render_include(bencher: Bencher) {
    let engine = Engine::builder()
        .loader(InMemoryLoader::new().with(with_loop()))
        .build();
    let template = Template::builder("page")
        .text("<main>")
        .action(core("include").with_param("template", ActionParameter::constant("loop")))
        .text("</main>")
        .build();

    bencher.bench(|| {
        let mut ctx = loop_context(100);
        black_box(engine.render_to_string(&template, &mut ctx))
    });
}

// ============================================================================
// Conversion benchmarks
// ============================================================================

#[divan::bench]
fn convert_string_to_nested_list(bencher: Bencher) {
    let engine = Engine::builder().build();
    let target = TargetType::list_of(TargetType::list_of(TargetType::I32));
    let source = Value::from("[[1, 2, 3], [4, 5, 6], [7, 8, 9], [10, 11, 12]]");

    bencher.bench(|| black_box(engine.convert(source.clone(), &target)));
}
