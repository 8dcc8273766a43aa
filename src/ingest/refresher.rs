// Post-load refresher - recomputes the derived views from committed rows

use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::error::AppResult;
use crate::infrastructure::database::IngestStore;
use crate::infrastructure::schema::AggregateView;

/// Refresh every aggregate view in order, stopping at the first failure.
pub async fn refresh_views(store: &dyn IngestStore) -> AppResult<Vec<(AggregateView, Duration)>> {
    let mut refreshed = Vec::with_capacity(AggregateView::ALL.len());
    for view in AggregateView::ALL {
        let started = Instant::now();
        if let Err(e) = store.refresh_view(view).await {
            error!("Refresh of {} failed, loaded rows stay committed: {}", view, e);
            return Err(e);
        }
        let elapsed = started.elapsed();
        info!("Refreshed {} in {:?}", view, elapsed);
        refreshed.push((view, elapsed));
    }
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::memory_store::MemoryStore;

    #[tokio::test]
    async fn test_views_refresh_in_order() {
        let store = MemoryStore::new();
        let refreshed = refresh_views(&store).await.unwrap();
        let order: Vec<AggregateView> = refreshed.into_iter().map(|(view, _)| view).collect();
        assert_eq!(order, AggregateView::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_failure_stops_later_views() {
        let store = MemoryStore::failing_refresh(AggregateView::TopicPartyBreakdown);
        let err = refresh_views(&store).await.unwrap_err();

        assert!(matches!(err, AppError::RefreshError { ref view, .. } if view == "topic_party_breakdown"));
        assert!(store.view_rows(AggregateView::TopicEngagementDaily).await.is_some());
        assert!(store.view_rows(AggregateView::TopicStateBreakdown).await.is_none());
    }
}
