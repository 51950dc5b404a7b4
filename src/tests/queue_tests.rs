//! Scheduling-contract tests for the lookup queue.

#[cfg(test)]
mod tests {
    use crate::account::AccountKey;
    use crate::queue::{QueryQueue, QueueError, QueueStatus};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    fn key(name: &str) -> AccountKey {
        AccountKey::parse(name).unwrap()
    }

    async fn wait_until(queue: &QueryQueue, check: impl Fn(&QueueStatus) -> bool) {
        for _ in 0..500 {
            if check(&queue.status()) {
                return;
            }
            sleep(Duration::from_millis(2)).await;
        }
        panic!("queue never reached the expected state: {:?}", queue.status());
    }

    #[tokio::test]
    async fn concurrent_enqueues_for_one_key_accept_exactly_one() {
        let queue = QueryQueue::new(2, 16);
        let alice = key("alice");

        let attempts: Vec<_> = (0..4)
            .map(|_| {
                queue.enqueue(alice.clone(), false, async {
                    sleep(Duration::from_millis(20)).await;
                    "ok"
                })
            })
            .collect();
        let results = futures::future::join_all(attempts).await;

        let accepted = results.iter().filter(|result| result.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|result| matches!(result, Err(QueueError::AlreadyRunning(_))))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 3);
        assert_eq!(queue.status().running_count, 0);
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected_while_running() {
        let queue = QueryQueue::new(2, 16);
        let alice = key("alice");
        let (release, gate) = oneshot::channel::<()>();

        let first = tokio::spawn({
            let queue = queue.clone();
            let alice = alice.clone();
            async move {
                queue
                    .enqueue(alice, false, async move {
                        let _ = gate.await;
                        1
                    })
                    .await
            }
        });
        wait_until(&queue, |status| status.running_count == 1).await;

        let duplicate = queue.enqueue(alice.clone(), false, async { 2 }).await;
        assert_eq!(duplicate, Err(QueueError::AlreadyRunning(alice)));

        release.send(()).unwrap();
        assert_eq!(first.await.unwrap(), Ok(1));
        assert_eq!(queue.status().running_count, 0);
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected_while_queued() {
        let queue = QueryQueue::new(1, 16);
        let (release, gate) = oneshot::channel::<()>();

        let blocker = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .enqueue(key("blocker"), false, async move {
                        let _ = gate.await;
                    })
                    .await
            }
        });
        wait_until(&queue, |status| status.running_count == 1).await;

        let queued = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(key("alice"), false, async { 1 }).await }
        });
        wait_until(&queue, |status| status.pending_count == 1).await;

        // the marker form must collide with the queued bare handle
        let duplicate = queue.enqueue(key("@alice"), false, async { 2 }).await;
        assert_eq!(duplicate, Err(QueueError::AlreadyQueued(key("alice"))));

        release.send(()).unwrap();
        assert_eq!(queued.await.unwrap(), Ok(1));
        blocker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn running_count_never_exceeds_the_cap() {
        let queue = QueryQueue::new(2, 32);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let queue = queue.clone();
                let current = current.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    queue
                        .enqueue(key(&format!("user{i}")), false, async move {
                            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            sleep(Duration::from_millis(15)).await;
                            current.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
        assert_eq!(queue.status().running_count, 0);
    }

    #[tokio::test]
    async fn priority_tasks_start_before_the_normal_backlog() {
        let queue = QueryQueue::new(1, 16);
        let (release, gate) = oneshot::channel::<()>();
        let order = Arc::new(Mutex::new(Vec::new()));

        let blocker = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .enqueue(key("blocker"), false, async move {
                        let _ = gate.await;
                    })
                    .await
            }
        });
        wait_until(&queue, |status| status.running_count == 1).await;

        let mut handles = Vec::new();
        for (name, priority, backlog) in [("a", false, 1), ("b", true, 2), ("c", false, 3)] {
            let queue_task = queue.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                queue_task
                    .enqueue(key(name), priority, async move {
                        order.lock().unwrap().push(name);
                    })
                    .await
            }));
            wait_until(&queue, |status| status.pending_count == backlog).await;
        }

        release.send(()).unwrap();
        blocker.await.unwrap().unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn full_queue_rejects_without_disturbing_the_backlog() {
        let queue = QueryQueue::new(1, 1);
        let (release, gate) = oneshot::channel::<()>();

        let blocker = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .enqueue(key("blocker"), false, async move {
                        let _ = gate.await;
                        "blocker"
                    })
                    .await
            }
        });
        wait_until(&queue, |status| status.running_count == 1).await;

        let queued = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(key("queued"), false, async { "queued" }).await }
        });
        wait_until(&queue, |status| status.pending_count == 1).await;

        let rejected = queue.enqueue(key("overflow"), false, async { "no" }).await;
        assert_eq!(rejected, Err(QueueError::Full { capacity: 1 }));
        assert_eq!(queue.status().pending_count, 1);

        release.send(()).unwrap();
        assert_eq!(blocker.await.unwrap(), Ok("blocker"));
        assert_eq!(queued.await.unwrap(), Ok("queued"));
    }

    #[tokio::test]
    async fn lowering_the_cap_cancels_nothing_and_gates_new_starts() {
        let queue = QueryQueue::new(5, 16);

        let mut gates = Vec::new();
        let mut handles = Vec::new();
        for i in 0..5 {
            let (release, gate) = oneshot::channel::<()>();
            gates.push(release);
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(key(&format!("running{i}")), false, async move {
                        let _ = gate.await;
                    })
                    .await
            }));
        }
        wait_until(&queue, |status| status.running_count == 5).await;

        assert_eq!(queue.set_max_concurrent(2), 2);
        // already-running tasks are untouched
        assert_eq!(queue.status().running_count, 5);

        let started = Arc::new(AtomicBool::new(false));
        let waiting = tokio::spawn({
            let queue = queue.clone();
            let started = started.clone();
            async move {
                queue
                    .enqueue(key("waiting"), false, async move {
                        started.store(true, Ordering::SeqCst);
                    })
                    .await
            }
        });
        wait_until(&queue, |status| status.pending_count == 1).await;

        for release in gates.drain(..3) {
            release.send(()).unwrap();
        }
        wait_until(&queue, |status| status.running_count == 2).await;
        sleep(Duration::from_millis(20)).await;
        assert!(!started.load(Ordering::SeqCst));
        assert_eq!(queue.status().pending_count, 1);

        for release in gates.drain(..) {
            release.send(()).unwrap();
        }
        waiting.await.unwrap().unwrap();
        assert!(started.load(Ordering::SeqCst));
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn raising_the_cap_promotes_pending_tasks() {
        let queue = QueryQueue::new(1, 16);
        let (release, gate) = oneshot::channel::<()>();

        let blocker = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .enqueue(key("blocker"), false, async move {
                        let _ = gate.await;
                    })
                    .await
            }
        });
        wait_until(&queue, |status| status.running_count == 1).await;

        let queued = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(key("queued"), false, async { 7 }).await }
        });
        wait_until(&queue, |status| status.pending_count == 1).await;

        queue.set_max_concurrent(2);
        assert_eq!(queued.await.unwrap(), Ok(7));

        release.send(()).unwrap();
        blocker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cap_requests_are_clamped_not_rejected() {
        let queue = QueryQueue::new(0, 8);
        assert_eq!(queue.status().max_concurrent, 1);
        assert_eq!(queue.set_max_concurrent(0), 1);
        assert_eq!(queue.set_max_concurrent(42), 10);
    }

    #[tokio::test]
    async fn panicking_executor_still_frees_its_slot() {
        let queue = QueryQueue::new(1, 8);
        let alice = key("alice");

        let crashed = tokio::spawn({
            let queue = queue.clone();
            let alice = alice.clone();
            async move {
                queue
                    .enqueue(alice, false, async {
                        panic!("executor blew up");
                    })
                    .await
            }
        });
        assert!(crashed.await.unwrap_err().is_panic());
        assert_eq!(queue.status().running_count, 0);

        // the key is usable again
        let retried = queue.enqueue(alice, false, async { "fine" }).await;
        assert_eq!(retried, Ok("fine"));
    }

    #[tokio::test]
    async fn status_reports_running_and_pending_keys() {
        let queue = QueryQueue::new(1, 8);
        let (release, gate) = oneshot::channel::<()>();

        let blocker = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .enqueue(key("busy"), false, async move {
                        let _ = gate.await;
                    })
                    .await
            }
        });
        wait_until(&queue, |status| status.running_count == 1).await;

        let queued = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(key("later"), false, async {}).await }
        });
        wait_until(&queue, |status| status.pending_count == 1).await;

        let status = queue.status();
        assert_eq!(status.running_keys, vec![key("busy")]);
        assert_eq!(status.pending_keys, vec![key("later")]);

        release.send(()).unwrap();
        blocker.await.unwrap().unwrap();
        queued.await.unwrap().unwrap();
    }
}
