use armada_client::{
  api::{MAX_LIMIT, MAX_LOG_LINES, MAX_TIMEOUT_MS},
  error::{Error, ErrorKind, Result},
};
use futures::future::join_all;

/// One item's outcome in a fan-out.
pub struct FanOutcome<T, R> {
  pub item: T,
  pub result: Result<R>,
}

/// Run `op` over every item concurrently and collect every outcome,
/// success or error. Futures are joined, not detached, so dropping
/// the fan-out cancels the in-flight work.
pub async fn fan_out<T, R, F, Fut>(
  items: Vec<T>,
  op: F,
) -> Vec<FanOutcome<T, R>>
where
  T: Clone,
  F: Fn(T) -> Fut,
  Fut: Future<Output = Result<R>>,
{
  let futures = items.into_iter().map(|item| {
    let fut = op(item.clone());
    async move {
      FanOutcome {
        item,
        result: fut.await,
      }
    }
  });
  join_all(futures).await
}

/// Partial failure mode: successes flow through, per-item errors are
/// logged and dropped from the user-visible output.
pub fn collect_partial<T: std::fmt::Display, R>(
  operation: &str,
  outcomes: Vec<FanOutcome<T, R>>,
) -> Vec<R> {
  let mut results = Vec::with_capacity(outcomes.len());
  for outcome in outcomes {
    match outcome.result {
      Ok(res) => results.push(res),
      Err(e) => {
        warn!("{operation} failed for {} | {e:#}", outcome.item);
      }
    }
  }
  results
}

/// Apply `offset` / `limit` after the caller has sorted by its
/// stable key, so pagination is deterministic across runs.
pub fn paginate<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
  items
    .into_iter()
    .skip(offset.max(0) as usize)
    .take(limit.max(0) as usize)
    .collect()
}

pub fn validate_page(limit: i64, offset: i64) -> Result<()> {
  if !(1..=MAX_LIMIT).contains(&limit) {
    return Err(Error::msg(
      ErrorKind::InvalidInput,
      format!("'limit' must be between 1 and {MAX_LIMIT}"),
    ));
  }
  if offset < 0 {
    return Err(Error::msg(
      ErrorKind::InvalidInput,
      "'offset' must be non-negative",
    ));
  }
  Ok(())
}

pub fn validate_lines(lines: i64) -> Result<()> {
  if !(1..=MAX_LOG_LINES).contains(&lines) {
    return Err(Error::msg(
      ErrorKind::InvalidInput,
      format!("'lines' must be between 1 and {MAX_LOG_LINES}"),
    ));
  }
  Ok(())
}

pub fn validate_timeout_ms(timeout_ms: Option<u64>) -> Result<()> {
  if let Some(ms) = timeout_ms
    && !(1..=MAX_TIMEOUT_MS).contains(&ms)
  {
    return Err(Error::msg(
      ErrorKind::InvalidInput,
      format!("'timeout_ms' must be between 1 and {MAX_TIMEOUT_MS}"),
    ));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[tokio::test]
  async fn fan_out_order_is_independent_of_completion_order() {
    // Later items finish first; collection order must still follow
    // the input order.
    let items = vec![30u64, 20, 10];
    let outcomes = fan_out(items, |delay| async move {
      tokio::time::sleep(Duration::from_millis(delay)).await;
      Ok(delay)
    })
    .await;
    let collected = outcomes
      .into_iter()
      .map(|o| o.result.unwrap())
      .collect::<Vec<_>>();
    assert_eq!(collected, vec![30, 20, 10]);
  }

  #[tokio::test]
  async fn fan_out_runs_concurrently() {
    let start = std::time::Instant::now();
    let outcomes = fan_out(vec![50u64; 10], |delay| async move {
      tokio::time::sleep(Duration::from_millis(delay)).await;
      Ok(())
    })
    .await;
    assert_eq!(outcomes.len(), 10);
    // Wall clock tracks the max latency, not the sum.
    assert!(start.elapsed() < Duration::from_millis(400));
  }

  #[tokio::test]
  async fn collect_partial_drops_errors() {
    let outcomes = fan_out(vec![1i64, 2, 3], |n| async move {
      if n == 2 {
        Err(Error::msg(ErrorKind::Connectivity, "host down"))
      } else {
        Ok(n * 10)
      }
    })
    .await;
    let collected = collect_partial("test op", outcomes);
    assert_eq!(collected, vec![10, 30]);
  }

  #[test]
  fn pagination_bounds() {
    assert!(validate_page(1, 0).is_ok());
    assert!(validate_page(100, 5).is_ok());
    assert_eq!(
      validate_page(0, 0).unwrap_err().kind,
      ErrorKind::InvalidInput
    );
    assert_eq!(
      validate_page(101, 0).unwrap_err().kind,
      ErrorKind::InvalidInput
    );
    assert_eq!(
      validate_page(20, -1).unwrap_err().kind,
      ErrorKind::InvalidInput
    );

    let page = paginate((0..10).collect::<Vec<_>>(), 3, 4);
    assert_eq!(page, vec![4, 5, 6]);
  }

  #[test]
  fn line_and_timeout_bounds() {
    assert!(validate_lines(500).is_ok());
    assert_eq!(
      validate_lines(501).unwrap_err().kind,
      ErrorKind::InvalidInput
    );
    assert!(validate_timeout_ms(None).is_ok());
    assert!(validate_timeout_ms(Some(300_000)).is_ok());
    assert_eq!(
      validate_timeout_ms(Some(300_001)).unwrap_err().kind,
      ErrorKind::InvalidInput
    );
  }
}
