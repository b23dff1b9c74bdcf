//! End-to-end scenario: three eager singletons `X, Y, Z` with `Z` depending
//! on `Y` and `Y` depending on `X` must start in `X, Y, Z` order and stop
//! in the reverse, `Z, Y, X`.

use std::sync::Arc;

use parking_lot::Mutex;

use gaz::{Container, HookContext, LifecycleEngine};
use gaz::lifecycle::ShutdownConfig;

struct X;
struct Y;
struct Z;

#[tokio::test]
async fn eager_singletons_start_and_stop_in_dependency_order() {
    let container = Arc::new(Container::new());
    let started: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let stopped: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    container
        .register_eager_singleton::<X, _>("test", |_| Ok(X))
        .on_start({
            let started = started.clone();
            move |_ctx, _value| {
                let started = started.clone();
                async move {
                    started.lock().push("X");
                    Ok(())
                }
            }
        })
        .on_stop({
            let stopped = stopped.clone();
            move |_ctx, _value| {
                let stopped = stopped.clone();
                async move {
                    stopped.lock().push("X");
                    Ok(())
                }
            }
        })
        .register(&container)
        .unwrap();

    container
        .register_eager_singleton::<Y, _>("test", |c| {
            c.resolve::<X>()?;
            Ok(Y)
        })
        .on_start({
            let started = started.clone();
            move |_ctx, _value| {
                let started = started.clone();
                async move {
                    started.lock().push("Y");
                    Ok(())
                }
            }
        })
        .on_stop({
            let stopped = stopped.clone();
            move |_ctx, _value| {
                let stopped = stopped.clone();
                async move {
                    stopped.lock().push("Y");
                    Ok(())
                }
            }
        })
        .register(&container)
        .unwrap();

    container
        .register_eager_singleton::<Z, _>("test", |c| {
            c.resolve::<Y>()?;
            Ok(Z)
        })
        .on_start({
            let started = started.clone();
            move |_ctx, _value| {
                let started = started.clone();
                async move {
                    started.lock().push("Z");
                    Ok(())
                }
            }
        })
        .on_stop({
            let stopped = stopped.clone();
            move |_ctx, _value| {
                let stopped = stopped.clone();
                async move {
                    stopped.lock().push("Z");
                    Ok(())
                }
            }
        })
        .register(&container)
        .unwrap();

    let engine = LifecycleEngine::new(container.clone(), ShutdownConfig::default());
    engine.start(HookContext::new()).await.unwrap();
    assert_eq!(*started.lock(), vec!["X", "Y", "Z"]);

    engine.stop(HookContext::new()).await.unwrap();
    assert_eq!(*stopped.lock(), vec!["Z", "Y", "X"]);
}
