//! Per-task resolution chains, used to detect cyclic dependencies.
//!
//! spec.md §9 calls out that a thread-local chain (the approach the teacher
//! this crate is descended from takes) is wrong once resolution can happen
//! from inside an async task: many tasks share one OS thread, and a
//! thread-local would see unrelated tasks' chains bleed into each other.
//! Instead, the chain is keyed by [`TaskToken`], which prefers the current
//! Tokio task id and only falls back to the OS thread id when resolution
//! happens outside of a task (e.g. in a `#[test]` that isn't `#[tokio::test]`,
//! or during eager construction on the calling thread before any task has
//! been spawned).

use std::cell::RefCell;
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::key::ServiceKey;

/// Identifies the logical caller a resolution chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TaskToken {
    Task(tokio::task::Id),
    Thread(std::thread::ThreadId),
}

impl TaskToken {
    pub(crate) fn current() -> Self {
        match tokio::task::try_id() {
            Some(id) => TaskToken::Task(id),
            None => TaskToken::Thread(std::thread::current().id()),
        }
    }
}

thread_local! {
    // A thread-local fast path for the common case (one task per thread at a
    // time, or no runtime at all). Keyed by TaskToken so a thread that hosts
    // more than one task (the multi-threaded runtime moving a task between
    // polls) never confuses two tasks' chains — only the chain matching the
    // *current* token is ever read or written here.
    static LOCAL: RefCell<Option<(TaskToken, Vec<ServiceKey>)>> = const { RefCell::new(None) };
}

// A fallback, cross-thread map for the rare case where the thread-local slot
// is occupied by a different task than the current one (e.g. two tasks
// interleaved via cooperative yielding on the same thread). This keeps chain
// tracking correct at some lock cost only in that uncommon interleaving.
static OVERFLOW: Mutex<Option<HashMap<TaskToken, Vec<ServiceKey>>>> = Mutex::new(None);

/// RAII guard that pops the most recently pushed key from the current
/// chain on drop, including on unwind from a resolution error.
pub(crate) struct ChainGuard {
    token: TaskToken,
    used_overflow: bool,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        if self.used_overflow {
            let mut guard = OVERFLOW.lock();
            if let Some(map) = guard.as_mut() {
                if let Some(chain) = map.get_mut(&self.token) {
                    chain.pop();
                    if chain.is_empty() {
                        map.remove(&self.token);
                    }
                }
            }
        } else {
            LOCAL.with(|local| {
                let mut local = local.borrow_mut();
                if let Some((token, chain)) = local.as_mut() {
                    if *token == self.token {
                        chain.pop();
                        if chain.is_empty() {
                            *local = None;
                        }
                    }
                }
            });
        }
    }
}

/// Enters `key` into the current task's resolution chain.
///
/// If `key` is already present in the chain, returns `Err` with the full
/// chain (existing chain with `key` appended again), per spec.md §4.1 step
/// 1 — the caller does not push in this case, so there is nothing to pop.
/// Otherwise pushes `key` and returns a guard that pops it back off on
/// drop, including on unwind.
pub(crate) fn enter(key: ServiceKey) -> Result<ChainGuard, Vec<ServiceKey>> {
    let token = TaskToken::current();

    enum Outcome {
        Pushed(bool),
        Cyclic(Vec<ServiceKey>),
    }

    let local_outcome = LOCAL.with(|local| {
        let mut local = local.borrow_mut();
        match local.as_mut() {
            Some((existing, chain)) if *existing == token => {
                if chain.contains(&key) {
                    let mut full = chain.clone();
                    full.push(key);
                    Some(Outcome::Cyclic(full))
                } else {
                    chain.push(key);
                    Some(Outcome::Pushed(false))
                }
            }
            None => {
                *local = Some((token, vec![key]));
                Some(Outcome::Pushed(false))
            }
            Some(_) => None,
        }
    });

    if let Some(outcome) = local_outcome {
        return match outcome {
            Outcome::Pushed(used_overflow) => Ok(ChainGuard { token, used_overflow }),
            Outcome::Cyclic(full) => Err(full),
        };
    }

    let mut guard = OVERFLOW.lock();
    let map = guard.get_or_insert_with(HashMap::new);
    let chain = map.entry(token).or_default();
    if chain.contains(&key) {
        let mut full = chain.clone();
        full.push(key);
        return Err(full);
    }
    chain.push(key);
    Ok(ChainGuard {
        token,
        used_overflow: true,
    })
}

/// The key currently at the top of this task's chain, if any — i.e. the
/// consumer on whose behalf the next `enter` would be a nested resolution.
/// Used to record `consumer -> dependency` edges without mutating the
/// chain itself.
pub(crate) fn current_top() -> Option<ServiceKey> {
    let token = TaskToken::current();
    let local_top = LOCAL.with(|local| {
        let local = local.borrow();
        match local.as_ref() {
            Some((existing, chain)) if *existing == token => Some(chain.last().copied()),
            _ => None,
        }
    });
    if let Some(top) = local_top {
        return top;
    }
    let guard = OVERFLOW.lock();
    guard.as_ref().and_then(|map| map.get(&token)).and_then(|c| c.last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_then_drop_restores_empty_chain() {
        let key = ServiceKey::of::<u32>();
        let guard = enter(key).expect("not yet in chain");
        drop(guard);
        let _guard = enter(key).expect("chain should be empty again");
    }

    #[test]
    fn nested_enter_succeeds_for_distinct_keys() {
        let a = ServiceKey::of::<u32>();
        let b = ServiceKey::of::<u64>();
        let guard_a = enter(a).expect("not yet in chain");
        let guard_b = enter(b).expect("not yet in chain");
        drop(guard_b);
        drop(guard_a);
    }

    #[test]
    fn re_entering_same_key_reports_cycle() {
        let a = ServiceKey::of::<u32>();
        let _guard_a = enter(a).expect("not yet in chain");
        let err = enter(a).expect_err("should detect cycle");
        assert_eq!(err, vec![a, a]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_tasks_do_not_share_chains() {
        let mut handles = Vec::new();
        for _ in 0..8 {
            handles.push(tokio::spawn(async {
                let key = ServiceKey::of::<u32>();
                let guard = enter(key).expect("task saw a non-empty chain from another task");
                tokio::task::yield_now().await;
                drop(guard);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }
}
