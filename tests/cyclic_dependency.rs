//! End-to-end scenario: two lazy singletons resolving each other must fail
//! with `CyclicDependency` and leave nothing cached.

use gaz::{Container, ContainerError};

struct A;
struct B;

#[test]
fn mutual_lazy_singletons_fail_with_cyclic_dependency() {
    let container = Container::new();

    container
        .register_lazy_singleton::<A, _>("a", |c| {
            c.resolve::<B>()?;
            Ok(A)
        })
        .register(&container)
        .unwrap();

    container
        .register_lazy_singleton::<B, _>("b", |c| {
            c.resolve::<A>()?;
            Ok(B)
        })
        .register(&container)
        .unwrap();

    let err = container.resolve::<A>().unwrap_err();
    match err {
        ContainerError::CyclicDependency { chain } => {
            assert_eq!(chain.0.len(), 3);
            assert_eq!(chain.0.first(), chain.0.last());
        }
        other => panic!("expected CyclicDependency, got {other:?}"),
    }

    // No intermediate value was cached: a fresh resolve attempt still
    // re-enters the same cycle rather than returning a stale value.
    let second = container.resolve::<A>().unwrap_err();
    assert!(matches!(second, ContainerError::CyclicDependency { .. }));
}
