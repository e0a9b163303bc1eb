use ferrous_container::{
    DiError, LifecycleHooks, LifecycleState, ServiceDefinition, ServiceProvider, ServiceResolver,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: &str) {
    log.lock().push(entry.to_string());
}

fn recording_hooks(log: &Log) -> LifecycleHooks {
    let (before, after, error) = (log.clone(), log.clone(), log.clone());
    LifecycleHooks::new()
        .before_init(move |_| {
            record(&before, "before_init");
            async { Ok(()) }
        })
        .after_init(move |_| {
            record(&after, "after_init");
            async { Ok(()) }
        })
        .on_error(move |err, instance| {
            record(&error, &format!("on_error({err}, instance={})", instance.is_some()));
            async { Ok(()) }
        })
}

#[tokio::test]
async fn init_hooks_run_in_order_after_construction() {
    let log: Log = Arc::default();
    let ctor_log = log.clone();
    let provider = ServiceProvider::new();
    provider.register(
        "svc",
        ServiceDefinition::new(ServiceResolver::constructor_sync(move |_| {
            record(&ctor_log, "construct");
            Ok(())
        }))
        .with_hooks(recording_hooks(&log)),
    );

    provider.resolve("svc").await.unwrap();
    provider.resolve("svc").await.unwrap();

    assert_eq!(*log.lock(), vec!["construct", "before_init", "after_init"]);
    assert_eq!(provider.lifecycle_state("svc"), Some(LifecycleState::Initialized));
}

#[tokio::test]
async fn resolver_failure_runs_on_error_without_instance() {
    let log: Log = Arc::default();
    let provider = ServiceProvider::new();
    provider.register(
        "svc",
        ServiceDefinition::new(ServiceResolver::constructor_sync(|_| -> Result<(), DiError> {
            Err(DiError::msg("boom"))
        }))
        .with_hooks(recording_hooks(&log)),
    );

    let err = provider.resolve("svc").await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(*log.lock(), vec!["on_error(boom, instance=false)"]);
    assert_eq!(provider.lifecycle_state("svc"), Some(LifecycleState::Error));
}

#[tokio::test]
async fn hook_failure_runs_on_error_with_instance() {
    let log: Log = Arc::default();
    let error_log = log.clone();
    let provider = ServiceProvider::new();
    provider.register(
        "svc",
        ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(7u8))).with_hooks(
            LifecycleHooks::new()
                .after_init(|_| async { Err(DiError::msg("not warmed up")) })
                .on_error(move |err, instance| {
                    let built = instance.and_then(|i| i.downcast_ref::<u8>().copied());
                    record(&error_log, &format!("{err}: {built:?}"));
                    async { Ok(()) }
                }),
        ),
    );

    let err = provider.resolve("svc").await.unwrap_err();
    assert_eq!(err.to_string(), "not warmed up");
    assert_eq!(*log.lock(), vec!["not warmed up: Some(7)"]);
    assert!(!provider.describe("svc").unwrap().cached);
}

#[tokio::test]
async fn on_error_failure_does_not_mask_original_error() {
    let provider = ServiceProvider::new();
    provider.register(
        "svc",
        ServiceDefinition::new(ServiceResolver::constructor_sync(|_| -> Result<(), DiError> {
            Err(DiError::msg("original"))
        }))
        .with_hooks(LifecycleHooks::new().on_error(|_, _| async { Err(DiError::msg("hook")) })),
    );

    let err = provider.resolve("svc").await.unwrap_err();
    assert_eq!(err.to_string(), "original");
}

#[tokio::test]
async fn failed_construction_is_retried_from_scratch() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let provider = ServiceProvider::new();
    provider.register(
        "flaky",
        ServiceDefinition::new(ServiceResolver::constructor_sync(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(DiError::msg("first attempt fails")),
                n => Ok(n),
            }
        })),
    );

    assert!(provider.resolve("flaky").await.is_err());
    assert_eq!(provider.lifecycle_state("flaky"), Some(LifecycleState::Error));

    let value = provider.resolve_as::<usize>("flaky").await.unwrap();
    assert_eq!(*value, 1);
    assert_eq!(provider.lifecycle_state("flaky"), Some(LifecycleState::Initialized));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn transient_hooks_run_per_resolution() {
    let inits = Arc::new(AtomicUsize::new(0));
    let counter = inits.clone();
    let provider = ServiceProvider::new();
    provider.register(
        "request",
        ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(())))
            .transient()
            .with_hooks(LifecycleHooks::new().after_init(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })),
    );

    for _ in 0..3 {
        provider.resolve("request").await.unwrap();
    }
    assert_eq!(inits.load(Ordering::SeqCst), 3);
    assert!(!provider.describe("request").unwrap().cached);
}

#[tokio::test]
async fn health_checks_follow_lifecycle_state() {
    let healthy = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let flag = healthy.clone();
    let provider = ServiceProvider::new();
    provider.register(
        "db",
        ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(()))).with_hooks(
            LifecycleHooks::new().health_check(move |_| {
                let ok = flag.load(Ordering::SeqCst);
                async move {
                    if ok {
                        Ok(())
                    } else {
                        Err(DiError::msg("connection lost"))
                    }
                }
            }),
        ),
    );
    provider.register_value("settings", ());

    let err = provider.check_health("db").await.unwrap_err();
    assert!(matches!(
        err,
        DiError::NotReady { state: Some(LifecycleState::Registered), .. }
    ));
    assert!(matches!(
        provider.check_health("unknown").await,
        Err(DiError::NotReady { state: None, .. })
    ));

    provider.resolve("db").await.unwrap();
    assert!(provider.check_health("db").await.is_ok());
    assert!(provider.check_health("settings").await.is_ok());

    healthy.store(false, Ordering::SeqCst);
    let report = provider.health_report().await;
    assert_eq!(report.services.len(), 2);
    assert!(!report.all_healthy());
    assert_eq!(report.healthy_count(), 1);
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id.as_str(), "db");
    assert_eq!(failures[0].error.as_deref(), Some("connection lost"));
}
