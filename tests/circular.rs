use ferrous_container::{
    ContainerConfig, DiError, LifecycleHooks, LifecycleState, ServiceDefinition, ServiceId, ServiceProvider,
    ServiceResolver,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn unit() -> ServiceDefinition {
    ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(())))
}

fn path_of(err: &DiError) -> Vec<&str> {
    err.cycle_path()
        .expect("expected a circular dependency error")
        .iter()
        .map(ServiceId::as_str)
        .collect()
}

#[tokio::test]
async fn three_node_cycle_reports_full_path() {
    let provider = ServiceProvider::new();
    provider.register("A", unit().depends_on("B"));
    provider.register("B", unit().depends_on("C"));
    provider.register("C", unit().depends_on("A"));

    let err = provider.resolve("A").await.unwrap_err();
    assert_eq!(path_of(&err), ["A", "B", "C", "A"]);
    assert_eq!(err.to_string(), "Circular dependency: A -> B -> C -> A");
}

#[tokio::test]
async fn self_dependency_is_circular() {
    let provider = ServiceProvider::new();
    provider.register("loop", unit().depends_on("loop"));

    let err = provider.resolve("loop").await.unwrap_err();
    assert_eq!(path_of(&err), ["loop", "loop"]);
}

#[tokio::test]
async fn cycle_path_starts_at_reentered_service() {
    let provider = ServiceProvider::new();
    provider.register("entry", unit().depends_on("X"));
    provider.register("X", unit().depends_on("Y"));
    provider.register("Y", unit().depends_on("X"));

    let err = provider.resolve("entry").await.unwrap_err();
    assert_eq!(path_of(&err), ["X", "Y", "X"]);
}

#[tokio::test]
async fn duplicate_dependency_is_not_a_cycle() {
    let provider = ServiceProvider::new();
    provider.register_value("shared", 3u8);
    provider.register(
        "pair",
        ServiceDefinition::new(ServiceResolver::constructor_sync(|deps| {
            Ok(*deps.get_as::<u8>(0)? + *deps.get_as::<u8>(1)?)
        }))
        .with_dependencies(["shared", "shared"]),
    );

    assert_eq!(*provider.resolve_as::<u8>("pair").await.unwrap(), 6);
}

#[tokio::test]
async fn cycle_through_factory_is_detected() {
    let provider = ServiceProvider::new();
    provider.register(
        "scheduler",
        ServiceDefinition::new(ServiceResolver::factory(|ctx| async move {
            ctx.resolve("jobs").await?;
            Ok(())
        })),
    );
    provider.register("jobs", unit().depends_on("scheduler"));

    let err = provider.resolve("scheduler").await.unwrap_err();
    assert_eq!(path_of(&err), ["scheduler", "jobs", "scheduler"]);
}

#[tokio::test]
async fn cycle_marks_members_failed_and_runs_on_error() {
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    let provider = ServiceProvider::new();
    provider.register(
        "A",
        unit().depends_on("B").with_hooks(LifecycleHooks::new().on_error(move |error, instance| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert!(matches!(error, DiError::Circular(_)));
            assert!(instance.is_none());
            async { Ok(()) }
        })),
    );
    provider.register("B", unit().depends_on("A"));

    assert!(provider.resolve("A").await.is_err());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(provider.lifecycle_state("A"), Some(LifecycleState::Error));
    assert_eq!(provider.lifecycle_state("B"), Some(LifecycleState::Error));

    // Breaking the cycle makes both resolvable on the next attempt.
    provider.register("B", unit());
    assert!(provider.resolve("A").await.is_ok());
    assert_eq!(provider.lifecycle_state("A"), Some(LifecycleState::Initialized));
}

#[tokio::test]
async fn depth_limit_stops_long_chains() {
    let provider = ServiceProvider::with_config(ContainerConfig::default().with_max_resolution_depth(4));
    for i in 0..6 {
        provider.register(format!("s{i}"), unit().depends_on(format!("s{}", i + 1)));
    }
    provider.register("s6", unit());

    let err = provider.resolve("s0").await.unwrap_err();
    assert!(matches!(err, DiError::DepthExceeded(4)));
    assert!(provider.resolve("s3").await.is_ok());
}
