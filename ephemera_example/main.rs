use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use std::rc::Rc;

use ephemera::{
    common::{
        constants::{DEFAULT_GC_THRESHOLD, DEFAULT_HEAP_SIZE},
        options::OptionsBuilder,
    },
    runtime::gc::HeapPtr,
    Context, ContextBuilder, FinalizationRegistry, FinalizationRegistryObject, NativeFunction,
    Value, WeakRef, WeakRefError,
};

/// Walk through weak handles and finalization registries on a small heap.
#[derive(Parser)]
#[command(about)]
pub struct Args {
    /// The maximum heap size, in bytes.
    #[arg(long)]
    pub heap_size: Option<usize>,

    /// Bytes allocated before the first collection starts.
    #[arg(long)]
    pub gc_threshold: Option<usize>,

    /// Maximum number of cleanup callbacks run by a single job. Unlimited if not set.
    #[arg(long)]
    pub cleanup_batch_size: Option<usize>,

    /// Log filter, e.g. `debug` or `ephemera=trace`. Overridden by RUST_LOG.
    #[arg(long)]
    pub log: Option<String>,

    #[arg(value_enum, default_value_t = Scenario::All)]
    pub scenario: Scenario,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// A handle observes its target disappear
    WeakRef,
    /// Two handles to one target are cleared by the same collection
    SharedTarget,
    /// A registry's cleanup callback runs after its target dies
    Finalize,
    /// Unregistering a condemned target suppresses its callback
    Unregister,
    /// Targets in another domain are never collected through a handle
    CrossDomain,
    /// Run every scenario
    All,
}

const SCENARIOS: [(Scenario, &str, fn(&mut Context) -> Result<(), WeakRefError>); 5] = [
    (Scenario::WeakRef, "weak-ref", weak_ref),
    (Scenario::SharedTarget, "shared-target", shared_target),
    (Scenario::Finalize, "finalize", finalize),
    (Scenario::Unregister, "unregister", unregister),
    (Scenario::CrossDomain, "cross-domain", cross_domain),
];

pub fn print_error_message_and_exit(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn create_context(args: &Args) -> Context {
    let options = OptionsBuilder::new()
        .heap_size(args.heap_size.unwrap_or(DEFAULT_HEAP_SIZE))
        .gc_threshold(args.gc_threshold.unwrap_or(DEFAULT_GC_THRESHOLD))
        .cleanup_batch_size(args.cleanup_batch_size)
        .build();

    #[allow(unused_mut)]
    let mut cx = ContextBuilder::new().set_options(Rc::new(options)).build();

    #[cfg(feature = "gc_stress_test")]
    cx.set_gc_stress_test(true);

    cx
}

/// Finish the current turn, collect, then run every queued cleanup job.
fn collect_and_dispatch(cx: &mut Context) {
    cx.advance_turn();
    cx.collect_garbage();

    let num_jobs = cx.run_jobs();
    cx.print(&format!(
        "  collected: {} objects live, {} jobs run",
        cx.num_objects(),
        num_jobs
    ));
}

fn describe(cx: &mut Context, name: &str, handle: &Value) {
    let target = match WeakRef::deref_value(cx, handle) {
        Some(target) => Value::from(target).to_console_string(),
        None => "undefined".to_owned(),
    };
    cx.print(&format!("  {name}.deref() = {target}"));
}

fn logging_registry(
    cx: &mut Context,
) -> Result<HeapPtr<FinalizationRegistryObject>, WeakRefError> {
    let cleanup = NativeFunction::new(|cx, held_value| {
        cx.print(&format!("  cleanup({})", held_value.to_console_string()));
        Ok(())
    });

    let registry = FinalizationRegistry::create(cx, Value::from(cleanup))?;
    cx.root(registry);

    Ok(registry)
}

fn weak_ref(cx: &mut Context) -> Result<(), WeakRefError> {
    let target = cx.alloc_object(vec![])?;
    let target_root = cx.root(target);

    let handle = Value::from(WeakRef::create(cx, Value::from(target))?);
    cx.root(handle.clone());

    collect_and_dispatch(cx);
    describe(cx, "r1", &handle);

    cx.unroot(target_root);
    collect_and_dispatch(cx);
    describe(cx, "r1", &handle);

    Ok(())
}

fn shared_target(cx: &mut Context) -> Result<(), WeakRefError> {
    let target = cx.alloc_object(vec![])?;
    let target_root = cx.root(target);

    let first = Value::from(WeakRef::create(cx, Value::from(target))?);
    cx.root(first.clone());
    let second = Value::from(WeakRef::create(cx, Value::from(target))?);
    cx.root(second.clone());
    cx.unroot(target_root);

    collect_and_dispatch(cx);
    describe(cx, "r1", &first);
    describe(cx, "r2", &second);

    Ok(())
}

fn finalize(cx: &mut Context) -> Result<(), WeakRefError> {
    let registry = logging_registry(cx)?;

    let target = Value::from(cx.alloc_object(vec![])?);
    FinalizationRegistry::register(
        cx,
        registry,
        target.clone(),
        Value::from("held"),
        Some(target.clone()),
    )?;

    collect_and_dispatch(cx);

    let removed = FinalizationRegistry::unregister(cx, registry, &target);
    cx.print(&format!("  unregister(target) = {removed}"));

    Ok(())
}

fn unregister(cx: &mut Context) -> Result<(), WeakRefError> {
    let registry = logging_registry(cx)?;

    let token = Value::from(cx.alloc_object(vec![])?);
    cx.root(token.clone());

    let target = Value::from(cx.alloc_object(vec![])?);
    FinalizationRegistry::register(cx, registry, target, Value::from("held"), Some(token.clone()))?;

    cx.advance_turn();
    cx.collect_garbage();
    cx.print(&format!(
        "  pending before unregister: {}",
        cx.pending_cleanup_count(registry)
    ));

    let removed = FinalizationRegistry::unregister(cx, registry, &token);
    cx.print(&format!("  unregister(token) = {removed}"));

    let num_jobs = cx.run_jobs();
    cx.print(&format!("  {num_jobs} jobs run"));

    Ok(())
}

fn cross_domain(cx: &mut Context) -> Result<(), WeakRefError> {
    let registry = logging_registry(cx)?;

    let domain = cx.create_domain();
    let target = cx.enter_domain(domain, |cx| cx.alloc_object(vec![]))?;
    cx.print(&format!("  target allocated in {}", target.domain()));

    let handle = Value::from(WeakRef::create(cx, Value::from(target))?);
    cx.root(handle.clone());
    FinalizationRegistry::register(cx, registry, Value::from(target), Value::from("held"), None)?;

    collect_and_dispatch(cx);
    describe(cx, "r1", &handle);

    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Some(filter) = &args.log {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
            )
            .init();
    }

    let mut cx = create_context(&args);

    for (scenario, name, run) in SCENARIOS {
        if args.scenario != Scenario::All && args.scenario != scenario {
            continue;
        }

        cx.print(&format!("{name}:"));
        if let Err(err) = run(&mut cx) {
            print_error_message_and_exit(&format!("{name}: {err}"));
        }
    }

    for exception in cx.take_uncaught_exceptions() {
        eprintln!("{exception}");
    }
}
