//! End-to-end scenario: cancelling the root context (the same trigger
//! `Application::run` races a terminate signal against) must run every
//! started service's stop hook exactly once, in reverse start order, with
//! `run` returning well within the configured shutdown timeout.
//!
//! Sending a real `SIGTERM` to the test process is not hermetic across
//! CI sandboxes, so this drives the identical code path `run` uses
//! internally: `tokio::select!` over `ctx.cancelled()` and the terminate
//! signal both feed the same shutdown sequence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use gaz::lifecycle::ShutdownConfig;
use gaz::{Application, HookContext};

struct Service;

#[tokio::test]
async fn cancellation_stops_every_service_exactly_once_in_reverse_order() {
    let app = Arc::new(Application::with_config(
        ShutdownConfig {
            hook_timeout: Duration::from_secs(5),
        },
        Default::default(),
        Default::default(),
    ));

    let stop_calls: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let start_calls: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    register_named(&app, "first", &start_calls, &stop_calls);
    register_named(&app, "second", &start_calls, &stop_calls);

    app.build().unwrap();

    let ctx = HookContext::new();
    let run_ctx = ctx.clone();
    let app_clone = app.clone();
    let start = Instant::now();
    let handle = tokio::spawn(async move { app_clone.run(run_ctx).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.cancel();

    handle.await.unwrap().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    assert_eq!(*start_calls.lock(), vec!["first", "second"]);
    assert_eq!(*stop_calls.lock(), vec!["second", "first"]);
}

fn register_named(
    app: &Application,
    name: &'static str,
    start_calls: &Arc<Mutex<Vec<&'static str>>>,
    stop_calls: &Arc<Mutex<Vec<&'static str>>>,
) {
    app.container()
        .register_named_lazy_singleton::<Service, _>(name, "test", move |_| Ok(Service))
        .on_start({
            let start_calls = start_calls.clone();
            move |_ctx, _value| {
                let start_calls = start_calls.clone();
                async move {
                    start_calls.lock().push(name);
                    Ok(())
                }
            }
        })
        .on_stop({
            let stop_calls = stop_calls.clone();
            move |_ctx, _value| {
                let stop_calls = stop_calls.clone();
                async move {
                    stop_calls.lock().push(name);
                    Ok(())
                }
            }
        })
        .register(app.container())
        .unwrap();
}
