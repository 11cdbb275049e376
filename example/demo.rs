use bisect_rs::{BoxError, MemoizedTask, TaskConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CACHE_DURATION_MS: u64 = 500;
const LOAD_DELAY_MS: u64 = 100;

#[derive(Debug, Clone)]
struct ExchangeRates {
    usd_per_eur: f64,
    fetched: u32,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "bisect_rs=debug".into()),
        )
        .init();

    let fetches = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let fetches_clone = fetches.clone();

    let rates = Arc::new(MemoizedTask::with_config(
        move |_: &()| {
            let fetched = fetches_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(LOAD_DELAY_MS)).await;
                Ok(ExchangeRates {
                    usd_per_eur: 1.08,
                    fetched,
                })
            })
        },
        |rates: ExchangeRates, _: &()| {
            Ok(format!(
                "1 EUR = {:.2} USD (fetch #{})",
                rates.usd_per_eur, rates.fetched
            ))
        },
        TaskConfig::expire_after_millis(CACHE_DURATION_MS),
    ));

    println!("Five concurrent callers share one fetch...");
    let mut handles = Vec::new();
    for _ in 0..5 {
        let rates = rates.clone();
        handles.push(tokio::spawn(async move { rates.finish(()).await }));
    }
    for handle in handles {
        println!("Got: {}", handle.await??);
    }

    println!("Served from cache: {}", rates.finish(()).await?);

    tokio::time::sleep(Duration::from_millis(CACHE_DURATION_MS + 50)).await;
    println!("After expiry: {}", rates.finish(()).await?);

    rates.clear();
    println!("After clear: {}", rates.finish(()).await?);

    println!(
        "Producer invoked {} times",
        fetches.load(std::sync::atomic::Ordering::SeqCst)
    );

    Ok(())
}
