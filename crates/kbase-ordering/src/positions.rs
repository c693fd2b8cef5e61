//! Gap-sequenced positions within an (account, category) scope.
//!
//! New documents land at `max + 10` of their scope, leaving room to slot
//! documents in between by hand. There is no automatic rebalancing.
//!
//! Two sequencing modes govern concurrent assignment in one scope:
//!
//! - [`Sequencing::Serialized`]: a per-scope lock spans reading the max and
//!   writing the new row, so concurrent creates get distinct positions
//! - [`Sequencing::Unsynchronized`]: no lock; two creates can read the same
//!   max and both land on the same position

use std::collections::BTreeMap;
use std::sync::Arc;

use kbase_core::{
    BulkEntryFailure, CategoryId, Document, DocumentId, DocumentStore, Error, KeyedLocks,
    PositionConfig, PositionScope, Result, Sequencing,
};
use tokio::sync::OwnedMutexGuard;

/// Distance between consecutive positions.
pub const POSITION_GAP: i64 = 10;

/// Context for [`PositionManager::on_category_changed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryChange {
    /// The category before the change.
    pub previous: Option<CategoryId>,
    /// Whether the document was persisted for the first time in this write.
    pub just_created: bool,
}

/// Assigns and maintains document positions.
pub struct PositionManager {
    store: Arc<dyn DocumentStore>,
    sequencing: Sequencing,
    locks: KeyedLocks<PositionScope>,
}

impl PositionManager {
    /// Create a manager over `store`.
    pub fn new(store: Arc<dyn DocumentStore>, sequencing: Sequencing) -> Self {
        Self {
            store,
            sequencing,
            locks: KeyedLocks::new(),
        }
    }

    /// Create a manager from the `[positions]` config section.
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &PositionConfig) -> Self {
        Self::new(store, config.sequencing)
    }

    /// The active sequencing mode.
    pub fn sequencing(&self) -> Sequencing {
        self.sequencing
    }

    async fn scope_guard(&self, scope: PositionScope) -> Option<OwnedMutexGuard<()>> {
        match self.sequencing {
            Sequencing::Serialized => Some(self.locks.lock(&scope).await),
            Sequencing::Unsynchronized => None,
        }
    }

    /// The position after the current maximum of `scope`, ignoring
    /// `excluding`. An empty scope starts at [`POSITION_GAP`].
    ///
    /// Fails with [`Error::Validation`] when the maximum leaves no room for
    /// another gap; reposition the scope to free some.
    pub async fn next_position(
        &self,
        scope: PositionScope,
        excluding: Option<DocumentId>,
    ) -> Result<i64> {
        let max = self.store.max_position(scope, excluding).await?.unwrap_or(0);
        max.checked_add(POSITION_GAP).ok_or_else(|| {
            Error::validation(format!("no position left after {max} in {scope}"))
        })
    }

    /// Give `document` the next position of its scope unless it already has one.
    ///
    /// Callers that insert afterwards should use [`create`](Self::create),
    /// which holds the scope lock across both steps.
    pub async fn assign_on_create(&self, document: &mut Document) -> Result<()> {
        if document.position.is_some() {
            return Ok(());
        }
        let position = self
            .next_position(document.position_scope(), Some(document.id))
            .await?;
        log::debug!(
            "assigned position {position} to document {} in {}",
            document.id,
            document.position_scope()
        );
        document.position = Some(position);
        Ok(())
    }

    /// Assign a position to `document` and insert it.
    pub async fn create(&self, mut document: Document) -> Result<Document> {
        let _guard = self.scope_guard(document.position_scope()).await;
        self.assign_on_create(&mut document).await?;
        self.store.insert(document.clone()).await?;
        Ok(document)
    }

    /// Move `document` to the end of its (new) category.
    ///
    /// Skipped for a document created in this write with a position already
    /// set and no prior category. Returns whether the position was rewritten.
    pub async fn on_category_changed(
        &self,
        document: &mut Document,
        change: CategoryChange,
    ) -> Result<bool> {
        if change.just_created && document.position.is_some() && change.previous.is_none() {
            return Ok(false);
        }

        let scope = document.position_scope();
        let _guard = self.scope_guard(scope).await;
        let position = self.next_position(scope, Some(document.id)).await?;
        self.store.update_position(document.id, position).await?;
        log::debug!(
            "document {} moved from category {:?} to {scope} at {position}",
            document.id,
            change.previous.map(|c| c.0)
        );
        document.position = Some(position);
        Ok(true)
    }

    /// Write every `id -> position` entry, in ascending id order.
    ///
    /// Entries are independent: a failing entry does not roll back the ones
    /// already written. When any entry fails the result is
    /// [`Error::BulkPartialFailure`] listing both sets.
    pub async fn bulk_reposition(
        &self,
        positions: &BTreeMap<DocumentId, i64>,
    ) -> Result<Vec<DocumentId>> {
        let mut applied = Vec::with_capacity(positions.len());
        let mut failed = Vec::new();

        for (&id, &position) in positions {
            match self.store.update_position(id, position).await {
                Ok(()) => applied.push(id),
                Err(e) => {
                    log::warn!("bulk reposition of document {id} failed: {e}");
                    failed.push(BulkEntryFailure {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if failed.is_empty() {
            Ok(applied)
        } else {
            Err(Error::BulkPartialFailure { applied, failed })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
