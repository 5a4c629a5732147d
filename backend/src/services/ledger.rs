//! Stock ledger service: admits movements and transfers and serves
//! reconstructed balances
//!
//! Writes to a lineage are serialized by a per-lineage lock. A transfer holds
//! the locks of every lineage it touches, acquired in key order, from the
//! availability check until its movements are written and the affected
//! lineages are recomputed. Cached rows of a lineage are dropped before its
//! movements change, so a failed write or recompute leaves a cache miss
//! rather than stale balances, and reads never see a cached balance older
//! than the last completed write.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use shared::{
    detect_discrepancies, evaluate_transfer, last_checkpoint, movement_stats, reconstruct_lineage,
    replay_from_checkpoint, stock_state, summarize_window, validate_movement, validate_transfer,
    validate_transfer_lines,
    AvailabilityCheck, DateWindow, DiscrepancyRecord, GroupingDimension, Ledger, LedgerEntry,
    LineageKey, Movement, MovementInput, MovementStats, NewMovement, SortKey, StockLevel,
    StockState, StockStatus, StockSummary, TransferInput, TransferRequest,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::config::{AlertsConfig, LedgerConfig};
use crate::error::{AppError, AppResult};
use crate::store::{MovementFilter, MovementStore};

/// Registry of per-lineage write locks
#[derive(Debug, Default)]
struct LineageLocks {
    locks: Mutex<HashMap<LineageKey, Arc<Mutex<()>>>>,
}

impl LineageLocks {
    /// Lock every lineage in `keys`, in key order
    async fn acquire(&self, keys: &[LineageKey]) -> Vec<OwnedMutexGuard<()>> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = {
                let mut locks = self.locks.lock().await;
                locks.entry(key).or_default().clone()
            };
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

/// Ledger service over a movement store
pub struct StockLedgerService<S> {
    store: S,
    ledger_config: LedgerConfig,
    alerts_config: AlertsConfig,
    locks: LineageLocks,
    cache: RwLock<HashMap<LineageKey, Vec<LedgerEntry>>>,
}

impl<S: MovementStore> StockLedgerService<S> {
    /// Create a new StockLedgerService instance
    pub fn new(store: S, ledger_config: LedgerConfig, alerts_config: AlertsConfig) -> Self {
        Self {
            store,
            ledger_config,
            alerts_config,
            locks: LineageLocks::default(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Validate and record a single movement. A movement naming a counterpart
    /// warehouse is a transfer and goes through the availability gate.
    pub async fn record_movement(&self, input: &MovementInput, today: NaiveDate) -> AppResult<Vec<Movement>> {
        let movement = validate_movement(input, today)?;
        match TransferRequest::from_movement(&movement) {
            Some(request) => {
                validate_transfer_lines(&request.lines)?;
                self.admit_transfer(request).await
            }
            None => self.admit(movement).await.map(|m| vec![m]),
        }
    }

    /// Validate and record a multi-bottle-type transfer, all or nothing
    pub async fn record_transfer(&self, input: &TransferInput, today: NaiveDate) -> AppResult<Vec<Movement>> {
        let request = validate_transfer(input, today)?;
        self.admit_transfer(request).await
    }

    /// Record an already validated plain movement
    pub async fn admit(&self, movement: NewMovement) -> AppResult<Movement> {
        let key = movement.lineage;
        let _guards = self.locks.acquire(&[key]).await;

        let previous = self.evict(&[key]).await;
        let movement = movement.into_movement(Uuid::new_v4(), Utc::now());
        self.store.append(movement.clone()).await?;
        let appended = previous
            .get(&key)
            .map(|rows| (movement.sort_key(), rows.as_slice()));
        self.recompute(key, appended).await?;

        tracing::info!(
            movement_id = %movement.id,
            lineage = %key,
            kind = movement.kind.as_str(),
            "Movement recorded"
        );
        Ok(movement)
    }

    /// Check every line against its source lineage and, when all pass, write
    /// the linked outgoing/incoming pairs
    pub async fn admit_transfer(&self, request: TransferRequest) -> AppResult<Vec<Movement>> {
        let keys = request.lineages();
        let _guards = self.locks.acquire(&keys).await;

        let mut sources = Vec::with_capacity(request.lines.len());
        for (bottle_type, _) in &request.lines {
            let key = request.source_lineage(*bottle_type);
            sources.push((key, self.entries_locked(key).await?));
        }
        let verdict = evaluate_transfer(&sources.into_iter().collect::<Ledger>(), &request);

        if !verdict.is_admissible() {
            let shortfalls = verdict.shortfalls();
            tracing::warn!(
                source = request.source.as_str(),
                destination = request.destination.as_str(),
                rejected_lines = shortfalls.len(),
                "Transfer rejected"
            );
            return Err(AppError::InsufficientStock { shortfalls });
        }

        let created_at = Utc::now();
        let mut movements = Vec::with_capacity(request.lines.len() * 2);
        for (outgoing, incoming) in request.mirror_pairs() {
            let (out_id, in_id) = (Uuid::new_v4(), Uuid::new_v4());
            let mut outgoing = outgoing.into_movement(out_id, created_at);
            let mut incoming = incoming.into_movement(in_id, created_at);
            outgoing.linked_movement_id = Some(in_id);
            incoming.linked_movement_id = Some(out_id);
            movements.push(outgoing);
            movements.push(incoming);
        }

        let previous = self.evict(&keys).await;
        self.store.append_all(movements.clone()).await?;
        for key in &keys {
            let first_appended = movements
                .iter()
                .filter(|m| m.lineage == *key)
                .map(Movement::sort_key)
                .min();
            let appended = first_appended.zip(previous.get(key).map(Vec::as_slice));
            self.recompute(*key, appended).await?;
        }

        tracing::info!(
            source = request.source.as_str(),
            destination = request.destination.as_str(),
            lines = request.lines.len(),
            "Transfer admitted"
        );
        Ok(movements)
    }

    /// Hard-delete a movement together with its transfer mirror, then
    /// recompute every affected lineage. Returns the deleted ids.
    pub async fn delete_movement(&self, id: Uuid) -> AppResult<Vec<Uuid>> {
        let movement = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Movement {}", id)))?;

        let mut doomed = vec![movement.clone()];
        if let Some(linked_id) = movement.linked_movement_id {
            if let Some(linked) = self.store.get(linked_id).await? {
                doomed.push(linked);
            }
        }

        let keys: Vec<LineageKey> = doomed.iter().map(|m| m.lineage).collect();
        let _guards = self.locks.acquire(&keys).await;

        let ids: Vec<Uuid> = doomed.iter().map(|m| m.id).collect();
        self.evict(&keys).await;
        self.store.delete_all(ids.clone()).await?;
        for key in &keys {
            self.recompute(*key, None).await?;
        }

        tracing::info!(movement_id = %id, deleted = ids.len(), "Movement deleted");
        Ok(ids)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Annotated history of one lineage
    pub async fn lineage_entries(&self, key: LineageKey) -> AppResult<Vec<LedgerEntry>> {
        if let Some(entries) = self.cache.read().await.get(&key) {
            return Ok(entries.clone());
        }
        let _guards = self.locks.acquire(&[key]).await;
        self.entries_locked(key).await
    }

    pub async fn current_stock(&self, key: LineageKey) -> AppResult<i64> {
        Ok(self.lineage_entries(key).await?.last().map_or(0, |e| e.stock_after))
    }

    pub async fn check_availability(&self, key: LineageKey, requested: u32) -> AppResult<AvailabilityCheck> {
        Ok(shared::check_availability(key, self.current_stock(key).await?, requested))
    }

    pub async fn stock_state(&self, key: LineageKey) -> AppResult<StockState> {
        Ok(stock_state(key, &self.lineage_entries(key).await?))
    }

    /// Full ledger rebuilt from every stored movement
    pub async fn ledger(&self) -> AppResult<Ledger> {
        let movements = self.store.list(MovementFilter::all()).await?;
        Ok(Ledger::compute(movements))
    }

    pub async fn stock_states(&self) -> AppResult<Vec<StockState>> {
        Ok(self.ledger().await?.states())
    }

    /// Significant écarts, using the configured threshold unless one is given
    pub async fn discrepancies(&self, threshold: Option<u32>) -> AppResult<Vec<DiscrepancyRecord>> {
        let threshold = threshold.unwrap_or(self.ledger_config.discrepancy_threshold);
        let records = detect_discrepancies(&self.stock_states().await?, threshold);
        tracing::debug!(threshold, found = records.len(), "Discrepancies detected");
        Ok(records)
    }

    pub async fn summarize(&self, window: DateWindow, dimension: GroupingDimension) -> AppResult<StockSummary> {
        Ok(summarize_window(&self.ledger().await?, window, dimension))
    }

    pub async fn stats(&self, window: DateWindow) -> AppResult<MovementStats> {
        let ledger = self.ledger().await?;
        Ok(movement_stats(ledger.rows(), window))
    }

    pub async fn stock_levels(&self) -> AppResult<Vec<StockLevel>> {
        Ok(self
            .ledger()
            .await?
            .stock_levels(self.alerts_config.low_stock_threshold))
    }

    /// Lineages at or below the alert threshold
    pub async fn low_stock(&self) -> AppResult<Vec<StockLevel>> {
        let mut levels = self.stock_levels().await?;
        levels.retain(|l| l.status != StockStatus::Ok);
        Ok(levels)
    }

    /// First negative row of every lineage that went below zero before any
    /// count
    pub async fn unexplained_negatives(&self) -> AppResult<Vec<LedgerEntry>> {
        let ledger = self.ledger().await?;
        let entries: Vec<LedgerEntry> = ledger.unexplained_negatives().into_iter().cloned().collect();
        for entry in &entries {
            tracing::warn!(
                lineage = %entry.movement.lineage,
                stock = entry.stock_after,
                date = %entry.movement.date,
                "Negative stock without a prior count"
            );
        }
        Ok(entries)
    }

    // ========================================================================
    // Cache maintenance, lineage lock held
    // ========================================================================

    async fn entries_locked(&self, key: LineageKey) -> AppResult<Vec<LedgerEntry>> {
        if let Some(entries) = self.cache.read().await.get(&key) {
            return Ok(entries.clone());
        }
        self.recompute(key, None).await
    }

    /// Remove the cached rows of `keys`, returning what was cached
    async fn evict(&self, keys: &[LineageKey]) -> HashMap<LineageKey, Vec<LedgerEntry>> {
        let mut cache = self.cache.write().await;
        keys.iter()
            .filter_map(|key| cache.remove(key).map(|rows| (*key, rows)))
            .collect()
    }

    /// Rebuild the cached rows of `key` from the store. `appended` pairs the
    /// earliest sort key written by this call with the rows cached before the
    /// write; when that key sorts after the last count and checkpoint replay
    /// is enabled, only the tail is refolded.
    async fn recompute(
        &self,
        key: LineageKey,
        appended: Option<(SortKey, &[LedgerEntry])>,
    ) -> AppResult<Vec<LedgerEntry>> {
        let movements = self.store.list(MovementFilter::lineage(key)).await?;

        let checkpoint = match appended {
            Some((sort_key, previous)) if self.ledger_config.checkpoint_replay => last_checkpoint(previous)
                .filter(|cp| sort_key > cp.sort_key)
                .map(|cp| (cp, previous)),
            _ => None,
        };

        let entries = match checkpoint {
            Some((cp, previous)) => {
                let mut entries: Vec<LedgerEntry> = previous
                    .iter()
                    .take_while(|e| e.sort_key() <= cp.sort_key)
                    .cloned()
                    .collect();
                entries.extend(replay_from_checkpoint(&cp, movements));
                tracing::debug!(lineage = %key, rows = entries.len(), "Lineage replayed from checkpoint");
                entries
            }
            _ => {
                let entries = reconstruct_lineage(movements);
                tracing::debug!(lineage = %key, rows = entries.len(), "Lineage recomputed");
                entries
            }
        };

        self.cache.write().await.insert(key, entries.clone());
        Ok(entries)
    }
}
