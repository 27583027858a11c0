use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Workflow admission weights. Heavier workflows consume more of the pool so
/// that e.g. LLM-backed note generation cannot saturate the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowWeight {
    ContentMonitoring,
    Rechunk,
    Import,
    Scoring,
}

impl WorkflowWeight {
    pub fn tokens(&self) -> u32 {
        match self {
            WorkflowWeight::ContentMonitoring => 2,
            WorkflowWeight::Rechunk => 4,
            WorkflowWeight::Import => 4,
            WorkflowWeight::Scoring => 1,
        }
    }
}

/// Weighted admission control across named pools. Every workflow acquires a
/// permit before doing user work; the permit releases itself on drop, on
/// every exit path.
pub struct TokenGate {
    capacity: u32,
    pools: DashMap<String, Arc<Semaphore>>,
}

impl TokenGate {
    pub fn new(capacity: u32) -> Self {
        TokenGate {
            capacity: capacity.max(1),
            pools: DashMap::new(),
        }
    }

    pub async fn acquire(&self, pool: &str, weight: WorkflowWeight) -> OwnedSemaphorePermit {
        let semaphore = self
            .pools
            .entry(pool.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.capacity as usize)))
            .clone();
        let tokens = weight.tokens().min(self.capacity);
        debug!(pool, tokens, "acquiring workflow tokens");
        semaphore
            .acquire_many_owned(tokens)
            .await
            .expect("token gate semaphore is never closed")
    }

    pub fn available(&self, pool: &str) -> usize {
        self.pools
            .get(pool)
            .map(|s| s.available_permits())
            .unwrap_or(self.capacity as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_weighted_acquire_and_release() {
        let gate = TokenGate::new(8);
        let permit = gate.acquire("default", WorkflowWeight::Rechunk).await;
        assert_eq!(gate.available("default"), 4);

        let second = gate.acquire("default", WorkflowWeight::ContentMonitoring).await;
        assert_eq!(gate.available("default"), 2);

        drop(permit);
        assert_eq!(gate.available("default"), 6);
        drop(second);
        assert_eq!(gate.available("default"), 8);
    }

    #[tokio::test]
    async fn test_pools_are_independent() {
        let gate = TokenGate::new(4);
        let _a = gate.acquire("default", WorkflowWeight::Import).await;
        assert_eq!(gate.available("default"), 0);
        assert_eq!(gate.available("scoring"), 4);
    }
}
