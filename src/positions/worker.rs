/// Bounded worker pool for one tick
///
/// Each position is handled by exactly one task; at most `concurrency`
/// run at once. A panicking task is reported as a failure of its order.
use super::report::{PositionOutcome, TickReport};
use super::types::Position;
use crate::errors::EngineError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub async fn run_bounded<F, Fut>(
    positions: Vec<Position>,
    concurrency: usize,
    report: &mut TickReport,
    evaluate: F,
) where
    F: Fn(Position) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<PositionOutcome, EngineError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let tasks: Vec<_> = positions
        .into_iter()
        .map(|position| {
            let order_id = position.order_id;
            let semaphore = semaphore.clone();
            let evaluate = evaluate.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| EngineError::Task(e.to_string()))?;
                evaluate(position).await
            });
            async move { (order_id, handle.await) }
        })
        .collect();

    for (order_id, joined) in futures::future::join_all(tasks).await {
        let result = joined.unwrap_or_else(|e| Err(EngineError::Task(e.to_string())));
        report.record(order_id, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrency_bound_and_panic_isolation() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let positions: Vec<Position> = (1..=6)
            .map(|order_id| Position {
                order_id,
                ..Default::default()
            })
            .collect();

        let mut report = TickReport::default();
        let (running_c, peak_c) = (running.clone(), peak.clone());
        run_bounded(positions, 2, &mut report, move |position| {
            let running = running_c.clone();
            let peak = peak_c.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                if position.order_id == 3 {
                    panic!("boom");
                }
                Ok(PositionOutcome::Held)
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(report.count("held"), 5);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].order_id, 3);
    }
}
