//! Bounded fan-out over a collection.
//!
//! [`bounded_map`] applies an async operation to every item of a collection
//! while at most `gate.capacity()` invocations are in flight. Results come
//! back in input order regardless of completion order.
//!
//! Items are admitted in input order: the mapper acquires a permit for item
//! `i` before it asks for item `i + 1`'s, and each admitted invocation runs
//! on its own task holding that permit. A failing or panicking invocation
//! only affects its own slot; siblings already admitted keep running and the
//! permit is released either way.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::gate::Gate;

/// Per-item failure introduced by the mapper itself.
///
/// Failures of the operation are part of `R`; these cover what happens
/// around it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// The gate refused to admit the item (it was closed).
    #[error("item {index} was not admitted: {reason}")]
    Rejected { index: usize, reason: String },

    /// The operation panicked.
    #[error("operation for item {index} panicked: {message}")]
    Panicked { index: usize, message: String },

    /// The operation's task ended without reporting a result.
    #[error("result for item {index} was lost")]
    Lost { index: usize },
}

impl MapError {
    /// Index of the item this failure belongs to.
    pub fn index(&self) -> usize {
        match self {
            Self::Rejected { index, .. } | Self::Panicked { index, .. } | Self::Lost { index } => {
                *index
            }
        }
    }
}

/// Runs `op(item, index)` over `items` with concurrency bounded by `gate`.
///
/// The returned vector has one entry per input item, in input order.
pub async fn bounded_map<T, R, F, Fut>(
    items: Vec<T>,
    gate: &Gate,
    op: F,
) -> Vec<Result<R, MapError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    bounded_map_observed(items, gate, op, |_, _| {}).await
}

/// Like [`bounded_map`], additionally calling `on_complete` once per item as
/// each result arrives (in completion order).
///
/// `on_complete` runs on the caller's task, one call at a time, so it can
/// keep plain mutable state such as a progress counter.
pub async fn bounded_map_observed<T, R, F, Fut, C>(
    items: Vec<T>,
    gate: &Gate,
    op: F,
    mut on_complete: C,
) -> Vec<Result<R, MapError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    C: FnMut(usize, &Result<R, MapError>),
{
    let total = items.len();
    let op = Arc::new(op);
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Result<R, MapError>)>();

    let admit = async move {
        for (index, item) in items.into_iter().enumerate() {
            let permit = match gate.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    debug!(index, error = %e, "Item not admitted");
                    let _ = tx.send((
                        index,
                        Err(MapError::Rejected {
                            index,
                            reason: e.to_string(),
                        }),
                    ));
                    continue;
                }
            };

            let op = Arc::clone(&op);
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = AssertUnwindSafe(async move { op(item, index).await })
                    .catch_unwind()
                    .await;
                drop(permit);

                let result = outcome.map_err(|payload| {
                    let message = panic_message(payload.as_ref());
                    warn!(index, %message, "Mapped operation panicked");
                    MapError::Panicked { index, message }
                });
                let _ = tx.send((index, result));
            });
        }
        // `tx` is dropped here; the channel closes once every worker reports.
    };

    let drain = async {
        let mut slots: Vec<Option<Result<R, MapError>>> = (0..total).map(|_| None).collect();
        while let Some((index, result)) = rx.recv().await {
            on_complete(index, &result);
            slots[index] = Some(result);
        }
        slots
    };

    let ((), slots) = tokio::join!(admit, drain);

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.unwrap_or(Err(MapError::Lost { index })))
        .collect()
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let gate = Gate::new(3, "items").unwrap();
        let items: Vec<u64> = vec![50, 10, 40, 0, 20, 30];

        let results = bounded_map(items.clone(), &gate, |delay, index| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            (index, delay * 2)
        })
        .await;

        let values: Vec<(usize, u64)> = results.into_iter().map(|r| r.unwrap()).collect();
        let expected: Vec<(usize, u64)> = items.iter().enumerate().map(|(i, d)| (i, d * 2)).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_bounded_by_gate() {
        let gate = Gate::new(2, "items").unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let (in_flight_op, max_op) = (Arc::clone(&in_flight), Arc::clone(&max_seen));
        let results = bounded_map((0..12).collect(), &gate, move |n: u32, _| {
            let in_flight = Arc::clone(&in_flight_op);
            let max_seen = Arc::clone(&max_op);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                n
            }
        })
        .await;

        assert_eq!(results.len(), 12);
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_captured_per_item() {
        let gate = Gate::new(2, "items").unwrap();

        let results = bounded_map(vec![1, 2, 3, 4], &gate, |n: i32, _| async move {
            if n == 3 {
                Err(format!("item {n} is malformed"))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        let values: Vec<Result<i32, String>> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            values,
            vec![Ok(10), Ok(20), Err("item 3 is malformed".to_string()), Ok(40)]
        );
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_panic_does_not_cancel_siblings() {
        let gate = Gate::new(1, "items").unwrap();

        let results = bounded_map(vec!["a", "boom", "c"], &gate, |s: &'static str, _| async move {
            if s == "boom" {
                panic!("parser blew up");
            }
            s.to_uppercase()
        })
        .await;

        assert_eq!(results[0], Ok("A".to_string()));
        assert_eq!(
            results[1],
            Err(MapError::Panicked {
                index: 1,
                message: "parser blew up".to_string()
            })
        );
        assert_eq!(results[2], Ok("C".to_string()));
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_closed_gate_rejects_remaining_items() {
        let gate = Gate::new(1, "items").unwrap();
        gate.close();

        let results = bounded_map(vec![1, 2], &gate, |n: i32, _| async move { n }).await;

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(MapError::Rejected { index: 0, .. })));
        assert_eq!(results[1].as_ref().unwrap_err().index(), 1);
    }

    #[tokio::test]
    async fn test_observer_called_once_per_item() {
        let gate = Gate::new(4, "items").unwrap();
        let mut seen = Vec::new();

        let results = bounded_map_observed(
            (0..6).collect(),
            &gate,
            |n: usize, _| async move { n },
            |index, result| {
                assert!(result.is_ok());
                seen.push(index);
            },
        )
        .await;

        assert_eq!(results.len(), 6);
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let gate = Gate::new(2, "items").unwrap();
        let results = bounded_map(Vec::<u8>::new(), &gate, |n, _| async move { n }).await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "unknown panic payload");
    }
}
