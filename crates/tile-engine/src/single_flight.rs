//! Async single-flight request collapsing: concurrent callers sharing a key
//! observe at most one call to the underlying work closure.
//!
//! Translated from a blocking `Mutex<HashMap<K, Status>>` + `Condvar` design
//! (one leader downloads, followers wait and then read the leader's result)
//! to `tokio::sync::Notify` so followers can suspend cooperatively inside an
//! async runtime instead of parking an OS thread.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Slot<V> {
    notify: Notify,
    /// `None` until the leader finishes; stays `None` on failure, since a
    /// failed leader's result is never cached - followers that observe a
    /// failure retry as a fresh leader rather than replaying the error.
    value: std::sync::Mutex<Option<V>>,
}

/// A keyed single-flight coordinator. Cheap to clone (`Arc` internally) so it
/// can be shared across request handlers.
pub struct SingleFlight<K, V> {
    in_flight: Mutex<HashMap<K, Arc<Slot<V>>>>,
}

/// Releases a leader's slot and wakes any followers on drop, whether the
/// leader returns normally, or is cancelled mid-`work()` (e.g. by the
/// caller's deadline timeout racing the `run` future via `tokio::select!` /
/// `tokio::time::timeout`, which simply drops it). Without this, a cancelled
/// leader would leave its slot in the map forever with no one left to
/// resolve `notify`, permanently poisoning the key.
struct LeaderGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    flight: &'a SingleFlight<K, V>,
    key: K,
    slot: Arc<Slot<V>>,
}

impl<'a, K, V> Drop for LeaderGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.flight.in_flight.lock().remove(&self.key);
        self.slot.notify.notify_waiters();
    }
}

enum Role<V> {
    Leader(Arc<Slot<V>>),
    Follower(Arc<Slot<V>>),
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        SingleFlight { in_flight: Mutex::new(HashMap::new()) }
    }

    /// Runs `work` at most once per `key` among all concurrently overlapping
    /// callers. Every caller - leader and followers alike - receives the same
    /// `Result`, except that a leader's error is not replayed to followers:
    /// they instead retry `work` themselves once the leader gives up the key.
    pub async fn run<F, Fut, E>(&self, key: K, work: F) -> Result<V, E>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        loop {
            let role = {
                let mut map = self.in_flight.lock();
                if let Some(existing) = map.get(&key) {
                    Role::Follower(Arc::clone(existing))
                } else {
                    let slot = Arc::new(Slot {
                        notify: Notify::new(),
                        value: std::sync::Mutex::new(None),
                    });
                    map.insert(key.clone(), Arc::clone(&slot));
                    Role::Leader(slot)
                }
            };

            let follower_slot = match role {
                Role::Leader(slot) => {
                    let guard = LeaderGuard {
                        flight: self,
                        key: key.clone(),
                        slot: Arc::clone(&slot),
                    };
                    let result = work().await;
                    if let Ok(ref value) = result {
                        *slot.value.lock().expect("slot mutex poisoned") = Some(value.clone());
                    }
                    drop(guard);
                    return result;
                }
                Role::Follower(slot) => slot,
            };

            let notified = follower_slot.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            notified.await;

            if let Some(value) = follower_slot.value.lock().expect("slot mutex poisoned").clone() {
                return Ok(value);
            }
            // Leader gave up the key without producing a value - either it
            // failed, or it was cancelled; loop back and race to become the
            // new leader.
        }
    }

    /// Number of keys currently being worked on by a leader.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_collapse_to_one_invocation() {
        let flight: Arc<SingleFlight<u32, Arc<[u8]>>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .run(7, || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok::<_, ()>(Arc::<[u8]>::from(vec![1u8, 2, 3]))
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.expect("task panicked");
            assert_eq!(result.unwrap().as_ref(), &[1u8, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_leader_lets_a_follower_retry_and_succeed() {
        let flight: SingleFlight<u32, u32> = SingleFlight::new();
        let attempt = Arc::new(AtomicUsize::new(0));

        let a = {
            let attempt = Arc::clone(&attempt);
            flight.run(1, move || {
                let attempt = Arc::clone(&attempt);
                async move {
                    if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("boom")
                    } else {
                        Ok(42)
                    }
                }
            })
        }
        .await;
        assert!(a.is_err());

        let b = flight
            .run(1, || async { Ok::<_, &'static str>(42) })
            .await;
        assert_eq!(b, Ok(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancelled_leader_releases_the_key_for_a_follower() {
        let flight: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());
        let leader_started = Arc::new(tokio::sync::Notify::new());

        let leader = {
            let flight = Arc::clone(&flight);
            let leader_started = Arc::clone(&leader_started);
            tokio::spawn(async move {
                flight
                    .run(1, move || {
                        let leader_started = Arc::clone(&leader_started);
                        async move {
                            leader_started.notify_one();
                            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                            Ok::<_, ()>(42)
                        }
                    })
                    .await
            })
        };

        leader_started.notified().await;
        leader.abort();
        let _ = leader.await;

        assert_eq!(flight.in_flight_count().await, 0);

        let follower = flight.run(1, || async { Ok::<_, ()>(7) }).await;
        assert_eq!(follower, Ok(7));
    }
}
