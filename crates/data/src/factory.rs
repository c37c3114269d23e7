use crate::store::SeriesStore;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Application-scoped, single-flight store initialization.
///
/// The store is expensive to build (remote history fetch plus merge), so the
/// first caller runs the build closure and every concurrent or later caller
/// receives the same `Arc`. A failed build leaves the cell empty so a later
/// call can retry.
#[derive(Default)]
pub struct StoreFactory {
    cell: OnceCell<Arc<SeriesStore>>,
}

impl StoreFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the shared store, building it on first use.
    ///
    /// # Errors
    ///
    /// Propagates the build closure's error; the cell stays uninitialized.
    pub async fn get_or_build<F, Fut>(&self, build: F) -> Result<Arc<SeriesStore>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SeriesStore>>,
    {
        let store = self
            .cell
            .get_or_try_init(|| async { build().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(store))
    }

    /// The store, if it has already been built.
    #[must_use]
    pub fn get(&self) -> Option<Arc<SeriesStore>> {
        self.cell.get().cloned()
    }
}
