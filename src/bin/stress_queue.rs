// Floods the lookup queue with synthetic executors to eyeball scheduling:
// the running count must never exceed the cap and priority lookups should
// start ahead of the normal backlog.

use rand::Rng;
use std::time::Duration;
use region_lookup_service::{AccountKey, QueryQueue};

#[tokio::main]
async fn main() {
    let queue = QueryQueue::new(4, 64);

    let sampler = {
        let queue = queue.clone();
        tokio::spawn(async move {
            let mut peak = 0;
            for _ in 0..50 {
                let status = queue.status();
                peak = peak.max(status.running_count);
                assert!(status.running_count <= status.max_concurrent);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            peak
        })
    };

    let mut handles = Vec::new();
    for i in 0..32 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let key = AccountKey::parse(&format!("user_{i}")).unwrap();
            let priority = i % 5 == 0;
            let result = queue
                .enqueue(key.clone(), priority, async {
                    let delay = rand::thread_rng().gen_range(20..120);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    delay
                })
                .await;

            match result {
                Ok(ms) => println!("{key} finished after {ms}ms (priority={priority})"),
                Err(err) => println!("{key} rejected: {err}"),
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    let peak = sampler.await.unwrap();
    println!("peak running: {peak}");
    println!("final status: {:?}", queue.status());
}
