//! Coalescing of concurrent misses for the same cache key.
//!
//! The first caller for a key becomes the leader and performs the upstream
//! call; later callers wait for the leader's outcome instead of queueing
//! their own call.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::Result;

type Waiter = oneshot::Sender<Result<Value>>;

/// Keys with an upstream call in progress, and who is waiting on each.
#[derive(Debug, Default)]
pub struct InFlight {
    waiters: Mutex<HashMap<String, Vec<Waiter>>>,
}

/// Role assigned by [`InFlight::join`].
pub enum Joined<'a> {
    /// Perform the call, then hand the outcome to [`LeaderGuard::complete`].
    Leader(LeaderGuard<'a>),
    /// Await the leader's outcome. A closed channel means the leader was
    /// cancelled before finishing.
    Follower(oneshot::Receiver<Result<Value>>),
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, key: &str) -> Joined<'_> {
        let mut waiters = self.lock();
        match waiters.get_mut(key) {
            Some(queue) => {
                let (tx, rx) = oneshot::channel();
                queue.push(tx);
                Joined::Follower(rx)
            }
            None => {
                waiters.insert(key.to_string(), Vec::new());
                Joined::Leader(LeaderGuard {
                    in_flight: self,
                    key: key.to_string(),
                    released: false,
                })
            }
        }
    }

    /// Number of keys currently being fetched.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Waiter>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held by the leader for one key. Dropping it without completing releases
/// the key and wakes followers with a closed channel.
pub struct LeaderGuard<'a> {
    in_flight: &'a InFlight,
    key: String,
    released: bool,
}

impl LeaderGuard<'_> {
    /// Delivers `outcome` to every follower and releases the key.
    pub fn complete(mut self, outcome: &Result<Value>) {
        for waiter in self.release() {
            // A follower that went away no longer needs the result
            let _ = waiter.send(outcome.clone());
        }
    }

    fn release(&mut self) -> Vec<Waiter> {
        self.released = true;
        self.in_flight.lock().remove(&self.key).unwrap_or_default()
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use serde_json::json;

    #[tokio::test]
    async fn test_first_caller_leads_others_follow() {
        let in_flight = InFlight::new();

        let Joined::Leader(guard) = in_flight.join("movie/550") else {
            panic!("first caller should lead");
        };
        let Joined::Follower(rx) = in_flight.join("movie/550") else {
            panic!("second caller should follow");
        };
        assert_eq!(in_flight.len(), 1);

        guard.complete(&Ok(json!({"id": 550})));

        assert_eq!(rx.await.unwrap().unwrap(), json!({"id": 550}));
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_errors_are_shared() {
        let in_flight = InFlight::new();

        let Joined::Leader(guard) = in_flight.join("k") else {
            panic!("first caller should lead");
        };
        let Joined::Follower(rx) = in_flight.join("k") else {
            panic!("second caller should follow");
        };

        guard.complete(&Err(ProxyError::Network("reset".to_string())));

        assert!(matches!(rx.await.unwrap(), Err(ProxyError::Network(_))));
    }

    #[tokio::test]
    async fn test_dropped_leader_closes_followers() {
        let in_flight = InFlight::new();

        let leader = in_flight.join("k");
        let Joined::Follower(rx) = in_flight.join("k") else {
            panic!("second caller should follow");
        };
        drop(leader);

        assert!(rx.await.is_err());
        assert!(in_flight.is_empty());
    }

    #[test]
    fn test_distinct_keys_both_lead() {
        let in_flight = InFlight::new();

        let a = in_flight.join("a");
        let b = in_flight.join("b");

        assert!(matches!(a, Joined::Leader(_)));
        assert!(matches!(b, Joined::Leader(_)));
        assert_eq!(in_flight.len(), 2);
    }

    #[test]
    fn test_key_is_reusable_after_completion() {
        let in_flight = InFlight::new();

        if let Joined::Leader(guard) = in_flight.join("k") {
            guard.complete(&Ok(json!(1)));
        }

        assert!(matches!(in_flight.join("k"), Joined::Leader(_)));
    }
}
