use bisect_rs::{MemoizedTask, TaskConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::advance;

fn calls_and_counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    (counter.clone(), counter)
}

#[tokio::test(start_paused = true)]
async fn test_expiry_boundary() {
    let (calls, counter) = calls_and_counter();

    let task = MemoizedTask::with_config(
        move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok("fresh") })
        },
        |value: &'static str, _: &()| Ok(value),
        TaskConfig::expire_after_millis(100),
    );

    task.finish(()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    advance(Duration::from_millis(99)).await;
    task.finish(()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    advance(Duration::from_millis(2)).await;
    task.finish(()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cached_value_served_until_expiry() {
    let (calls, counter) = calls_and_counter();

    let task = MemoizedTask::new(
        move |_: &()| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(n) })
        },
        |n: usize, _: &()| Ok(n),
    )
    .with_expiry(Duration::from_millis(100));

    assert_eq!(task.finish(()).await.unwrap(), 1);

    // hits do not extend the lifetime of the cached result
    advance(Duration::from_millis(60)).await;
    assert_eq!(task.finish(()).await.unwrap(), 1);
    advance(Duration::from_millis(30)).await;
    assert_eq!(task.finish(()).await.unwrap(), 1);

    advance(Duration::from_millis(20)).await;
    assert_eq!(task.finish(()).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeline_with_transform() {
    let (calls, counter) = calls_and_counter();

    let task = MemoizedTask::with_config(
        move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(1) })
        },
        |value: i32, _: &()| Ok(value + 1),
        TaskConfig::expire_after_millis(100),
    );

    assert_eq!(task.finish(()).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    advance(Duration::from_millis(50)).await;
    assert_eq!(task.finish(()).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    advance(Duration::from_millis(100)).await;
    assert_eq!(task.finish(()).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_never_expires_by_default() {
    let (calls, counter) = calls_and_counter();

    let task = MemoizedTask::with_config(
        move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(42u64) })
        },
        |value: u64, _: &()| Ok(value),
        TaskConfig::default(),
    );
    assert_eq!(task.expiry(), None);

    task.finish(()).await.unwrap();
    advance(Duration::from_secs(60 * 60 * 24 * 30)).await;
    task.finish(()).await.unwrap();

    assert!(task.is_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_result_is_not_observable() {
    let task = MemoizedTask::new(
        |_: &()| Box::pin(async move { Ok(vec![1, 2, 3]) }),
        |values: Vec<i32>, _: &()| Ok(values.len()),
    )
    .with_expiry(Duration::from_millis(10));

    task.finish(()).await.unwrap();
    assert!(task.is_cached());
    assert_eq!(task.peek().unwrap().unwrap(), vec![1, 2, 3]);

    advance(Duration::from_millis(10)).await;
    assert!(!task.is_cached());
    assert!(task.peek().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_clear_after_expiry_invokes_producer() {
    let (calls, counter) = calls_and_counter();

    let task = MemoizedTask::with_config(
        move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(()) })
        },
        |_: (), _: &()| Ok(()),
        TaskConfig::expire_after(Duration::from_millis(100)),
    );

    task.finish(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    task.clear();
    task.clear();
    task.start(()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_result_shared_across_expiry_check() {
    let (calls, counter) = calls_and_counter();

    let task = Arc::new(MemoizedTask::with_config(
        move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok("slow")
            })
        },
        |value: &'static str, _: &()| Ok(value.to_uppercase()),
        TaskConfig::expire_after_millis(100),
    ));

    let first = tokio::spawn({
        let task = task.clone();
        async move { task.finish(()).await }
    });
    tokio::task::yield_now().await;

    advance(Duration::from_millis(10)).await;
    let second = task.finish(()).await.unwrap();

    assert_eq!(first.await.unwrap().unwrap(), "SLOW");
    assert_eq!(second, "SLOW");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_expiry_duration() {
    let (calls, counter) = calls_and_counter();

    let task = MemoizedTask::with_config(
        move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(7) })
        },
        |value: i32, _: &()| Ok(value * 2),
        TaskConfig::expire_after(Duration::MAX),
    );

    assert_eq!(task.finish(()).await.unwrap(), 14);
    advance(Duration::from_secs(60 * 60 * 24 * 365)).await;
    assert_eq!(task.finish(()).await.unwrap(), 14);

    assert!(task.is_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
