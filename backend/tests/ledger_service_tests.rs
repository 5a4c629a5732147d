//! Stock ledger service tests
//!
//! Tests for the service boundary including:
//! - Recording movements and reading reconstructed balances
//! - All-or-nothing transfer admission
//! - Serialized transfers against a shared source
//! - Deletion with mirror removal and recompute
//! - Cache consistency when the store fails mid-write

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use lpg_stock_backend::config::{AlertsConfig, LedgerConfig};
use lpg_stock_backend::{
    AppError, AppResult, InMemoryMovementStore, MovementFilter, MovementStore, StockLedgerService,
};
use proptest::prelude::*;
use shared::{
    BottleType, Category, Client, DateWindow, GroupingDimension, LineageKey, Movement, MovementInput,
    MovementKind, StockStatus, TransferInput, TransferLineInput,
};
use uuid::Uuid;

type Service = StockLedgerService<InMemoryMovementStore>;

/// In-memory store that yields to the scheduler before every listing and
/// write, and whose listings can be switched to fail
#[derive(Debug, Default)]
struct InterleavingStore {
    inner: InMemoryMovementStore,
    fail_lists: AtomicBool,
}

impl InterleavingStore {
    fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }
}

impl MovementStore for InterleavingStore {
    async fn append(&self, movement: Movement) -> AppResult<Uuid> {
        tokio::task::yield_now().await;
        self.inner.append(movement).await
    }

    async fn append_all(&self, movements: Vec<Movement>) -> AppResult<Vec<Uuid>> {
        tokio::task::yield_now().await;
        self.inner.append_all(movements).await
    }

    async fn list(&self, filter: MovementFilter) -> AppResult<Vec<Movement>> {
        tokio::task::yield_now().await;
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(AppError::Store("listing unavailable".to_string()));
        }
        self.inner.list(filter).await
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Movement>> {
        self.inner.get(id).await
    }

    async fn delete_all(&self, ids: Vec<Uuid>) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.inner.delete_all(ids).await
    }
}

fn interleaving_service() -> StockLedgerService<InterleavingStore> {
    StockLedgerService::new(
        InterleavingStore::default(),
        LedgerConfig::default(),
        AlertsConfig::default(),
    )
}

fn service() -> Service {
    StockLedgerService::new(
        InMemoryMovementStore::new(),
        LedgerConfig::default(),
        AlertsConfig::default(),
    )
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn input(movement_type: &str, d: u32, category: &str, bottle_type: &str) -> MovementInput {
    MovementInput {
        movement_type: movement_type.to_string(),
        date: day(d),
        category: category.to_string(),
        bottle_type: bottle_type.to_string(),
        client: None,
        quantity: None,
        counted_stock: None,
        document_ref: None,
        origin: None,
        source_warehouse: None,
        destination_warehouse: None,
        notes: None,
    }
}

fn flow(movement_type: &str, d: u32, category: &str, bottle_type: &str, quantity: i32) -> MovementInput {
    MovementInput {
        quantity: Some(quantity),
        ..input(movement_type, d, category, bottle_type)
    }
}

fn count(d: u32, category: &str, bottle_type: &str, counted: i32) -> MovementInput {
    MovementInput {
        counted_stock: Some(counted),
        ..input("inventaire", d, category, bottle_type)
    }
}

fn transfer(d: u32, lines: &[(&str, i32)]) -> TransferInput {
    TransferInput {
        date: day(d),
        source_warehouse: "bouteilles_neuves".to_string(),
        destination_warehouse: "consignes".to_string(),
        client: None,
        lines: lines
            .iter()
            .map(|(b, q)| TransferLineInput {
                bottle_type: b.to_string(),
                quantity: *q,
            })
            .collect(),
        document_ref: Some("BT-2024-001".to_string()),
        origin: None,
        notes: None,
    }
}

fn key(category: Category, bottle_type: BottleType) -> LineageKey {
    LineageKey::new(category, bottle_type, None)
}

// ============================================================================
// Recording and reconstruction
// ============================================================================

#[tokio::test]
async fn test_end_to_end_scenario() {
    let service = service();
    service.record_movement(&flow("entree", 1, "consignes", "B12", 500), today()).await.unwrap();
    service.record_movement(&flow("entree", 2, "consignes", "B12", 300), today()).await.unwrap();
    service.record_movement(&flow("sortie", 3, "consignes", "B12", 200), today()).await.unwrap();
    service.record_movement(&count(4, "consignes", "B12", 550), today()).await.unwrap();
    service.record_movement(&flow("sortie", 5, "consignes", "B12", 100), today()).await.unwrap();

    let lineage = key(Category::Consignes, BottleType::B12);
    let entries = service.lineage_entries(lineage).await.unwrap();
    let after: Vec<i64> = entries.iter().map(|e| e.stock_after).collect();
    assert_eq!(after, vec![500, 800, 600, 550, 450]);
    assert_eq!(entries[3].ecart, Some(-50));

    let state = service.stock_state(lineage).await.unwrap();
    assert_eq!(state.stock_initial, 550);
    assert_eq!(state.cumul_exits, 100);
    assert_eq!(state.theoretical_stock, 450);

    let discrepancies = service.discrepancies(None).await.unwrap();
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].ecart, -50);
    assert!(service.discrepancies(Some(50)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_writes_nothing() {
    let service = service();
    let result = service
        .record_movement(&flow("sortie", 1, "consignes", "B12", -3), today())
        .await;

    match result {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "quantity"),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(service.store().is_empty().await);
}

#[tokio::test]
async fn test_negative_stock_is_reported() {
    let service = service();
    service.record_movement(&flow("entree", 1, "stock_outils", "B6", 10), today()).await.unwrap();
    service.record_movement(&flow("sortie", 2, "stock_outils", "B6", 25), today()).await.unwrap();

    let lineage = key(Category::StockOutils, BottleType::B6);
    assert_eq!(service.current_stock(lineage).await.unwrap(), -15);

    let negatives = service.unexplained_negatives().await.unwrap();
    assert_eq!(negatives.len(), 1);
    assert_eq!(negatives[0].stock_after, -15);

    let levels = service.low_stock().await.unwrap();
    assert_eq!(levels[0].status, StockStatus::Empty);
}

#[tokio::test]
async fn test_backdated_movement_rewrites_cached_rows() {
    let service = service();
    service.record_movement(&flow("entree", 1, "consignes", "B6", 100), today()).await.unwrap();
    service.record_movement(&count(5, "consignes", "B6", 90), today()).await.unwrap();

    let lineage = key(Category::Consignes, BottleType::B6);
    assert_eq!(service.lineage_entries(lineage).await.unwrap()[1].ecart, Some(-10));

    service.record_movement(&flow("sortie", 3, "consignes", "B6", 30), today()).await.unwrap();
    let entries = service.lineage_entries(lineage).await.unwrap();
    assert_eq!(entries[2].stock_before, 70);
    assert_eq!(entries[2].ecart, Some(20));
}

#[tokio::test]
async fn test_parc_ce_lineages_split_by_client() {
    let service = service();
    let mut petro = flow("entree", 1, "parc_ce", "B12", 40);
    petro.client = Some("petro_ivoire".to_string());
    let mut vivo = flow("entree", 1, "parc_ce", "B12", 15);
    vivo.client = Some("vivo_energy".to_string());

    service.record_movement(&petro, today()).await.unwrap();
    service.record_movement(&vivo, today()).await.unwrap();

    let petro_key = LineageKey::new(Category::ParcCe, BottleType::B12, Some(Client::PetroIvoire));
    assert_eq!(service.current_stock(petro_key).await.unwrap(), 40);
    assert_eq!(service.stock_states().await.unwrap().len(), 2);
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_transfer_writes_linked_mirrors() {
    let service = service();
    service.record_movement(&flow("entree", 1, "bouteilles_neuves", "B12", 100), today()).await.unwrap();

    let written = service.record_transfer(&transfer(2, &[("B12", 100)]), today()).await.unwrap();
    assert_eq!(written.len(), 2);
    let (outgoing, incoming) = (&written[0], &written[1]);
    assert_eq!(outgoing.linked_movement_id, Some(incoming.id));
    assert_eq!(incoming.linked_movement_id, Some(outgoing.id));
    assert_eq!(
        incoming.kind,
        MovementKind::Incoming {
            quantity: 100,
            source: Some(Category::BouteillesNeuves)
        }
    );

    assert_eq!(service.current_stock(key(Category::BouteillesNeuves, BottleType::B12)).await.unwrap(), 0);
    assert_eq!(service.current_stock(key(Category::Consignes, BottleType::B12)).await.unwrap(), 100);
}

#[tokio::test]
async fn test_transfer_is_all_or_nothing() {
    let service = service();
    service.record_movement(&flow("entree", 1, "bouteilles_neuves", "B6", 50), today()).await.unwrap();
    service.record_movement(&flow("entree", 1, "bouteilles_neuves", "B12", 100), today()).await.unwrap();

    let result = service
        .record_transfer(&transfer(2, &[("B6", 40), ("B12", 150)]), today())
        .await;

    match result {
        Err(AppError::InsufficientStock { shortfalls }) => {
            assert_eq!(shortfalls.len(), 1);
            assert_eq!(shortfalls[0].bottle_type, BottleType::B12);
            assert_eq!(shortfalls[0].missing, 50);
        }
        other => panic!("expected insufficient stock, got {:?}", other),
    }
    assert_eq!(service.store().len().await, 2);
    assert_eq!(service.current_stock(key(Category::BouteillesNeuves, BottleType::B6)).await.unwrap(), 50);
}

#[tokio::test]
async fn test_incoming_with_source_is_gated() {
    let service = service();
    service.record_movement(&flow("entree", 1, "stock_outils", "B28", 5), today()).await.unwrap();

    let mut pull = flow("entree", 2, "reconfiguration", "B28", 6);
    pull.source_warehouse = Some("stock_outils".to_string());
    assert!(matches!(
        service.record_movement(&pull, today()).await,
        Err(AppError::InsufficientStock { .. })
    ));

    pull.quantity = Some(5);
    let written = service.record_movement(&pull, today()).await.unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(service.current_stock(key(Category::Reconfiguration, BottleType::B28)).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_cannot_overdraw() {
    let service = Arc::new(interleaving_service());
    service.record_movement(&flow("entree", 1, "bouteilles_neuves", "B12", 100), today()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.record_transfer(&transfer(2, &[("B12", 60)]), today()).await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(AppError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(service.current_stock(key(Category::BouteillesNeuves, BottleType::B12)).await.unwrap(), 40);
}

#[tokio::test]
async fn test_zero_quantity_single_transfer_is_rejected() {
    let service = service();
    let mut push = flow("sortie", 2, "bouteilles_neuves", "B12", 0);
    push.destination_warehouse = Some("consignes".to_string());

    match service.record_movement(&push, today()).await {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "lines"),
        other => panic!("expected an empty transfer rejection, got {:?}", other),
    }
    assert!(service.store().is_empty().await);
}

#[tokio::test]
async fn test_check_availability() {
    let service = service();
    service.record_movement(&flow("entree", 1, "consignes", "B38", 100), today()).await.unwrap();
    let lineage = key(Category::Consignes, BottleType::B38);

    let short = service.check_availability(lineage, 150).await.unwrap();
    assert!(!short.available);
    assert_eq!(short.shortfall, 50);

    let exact = service.check_availability(lineage, 100).await.unwrap();
    assert!(exact.available);
    assert_eq!(exact.shortfall, 0);
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_recomputes_lineage() {
    let service = service();
    let first = service.record_movement(&flow("entree", 1, "consignes", "B12", 500), today()).await.unwrap();
    service.record_movement(&flow("entree", 2, "consignes", "B12", 300), today()).await.unwrap();
    service.record_movement(&count(3, "consignes", "B12", 790), today()).await.unwrap();

    let lineage = key(Category::Consignes, BottleType::B12);
    assert_eq!(service.lineage_entries(lineage).await.unwrap()[2].ecart, Some(-10));

    service.delete_movement(first[0].id).await.unwrap();
    let entries = service.lineage_entries(lineage).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].stock_before, 300);
    assert_eq!(entries[1].ecart, Some(490));
}

#[tokio::test]
async fn test_deleting_one_side_removes_transfer() {
    let service = service();
    service.record_movement(&flow("entree", 1, "bouteilles_neuves", "B6", 30), today()).await.unwrap();
    let written = service.record_transfer(&transfer(2, &[("B6", 20)]), today()).await.unwrap();

    let deleted = service.delete_movement(written[1].id).await.unwrap();
    assert_eq!(deleted.len(), 2);
    assert!(service.store().get(written[0].id).await.unwrap().is_none());

    assert_eq!(service.current_stock(key(Category::BouteillesNeuves, BottleType::B6)).await.unwrap(), 30);
    assert_eq!(service.current_stock(key(Category::Consignes, BottleType::B6)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_unknown_movement() {
    let result = service().delete_movement(Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_failed_recompute_leaves_no_stale_balance() {
    let service = interleaving_service();
    let lineage = key(Category::Consignes, BottleType::B12);
    service.record_movement(&flow("entree", 1, "consignes", "B12", 100), today()).await.unwrap();
    assert_eq!(service.current_stock(lineage).await.unwrap(), 100);

    service.store().fail_lists(true);
    let second = service.record_movement(&flow("entree", 2, "consignes", "B12", 50), today()).await;
    assert!(matches!(second, Err(AppError::Store(_))));
    service.store().fail_lists(false);

    assert_eq!(service.store().inner.len().await, 2);
    assert_eq!(service.current_stock(lineage).await.unwrap(), 150);
    assert_eq!(service.ledger().await.unwrap().current_stock(&lineage), 150);
}

#[tokio::test]
async fn test_gate_sees_writes_whose_recompute_failed() {
    let service = interleaving_service();
    let source = key(Category::BouteillesNeuves, BottleType::B12);
    service.record_movement(&flow("entree", 1, "bouteilles_neuves", "B12", 100), today()).await.unwrap();
    assert_eq!(service.current_stock(source).await.unwrap(), 100);

    service.store().fail_lists(true);
    assert!(service
        .record_movement(&flow("sortie", 2, "bouteilles_neuves", "B12", 80), today())
        .await
        .is_err());
    service.store().fail_lists(false);

    match service.record_transfer(&transfer(3, &[("B12", 60)]), today()).await {
        Err(AppError::InsufficientStock { shortfalls }) => assert_eq!(shortfalls[0].current_stock, 20),
        other => panic!("expected insufficient stock, got {:?}", other),
    }
    assert_eq!(service.current_stock(source).await.unwrap(), 20);
}

#[tokio::test]
async fn test_failed_recompute_after_delete_leaves_no_stale_balance() {
    let service = interleaving_service();
    let lineage = key(Category::Consignes, BottleType::B6);
    service.record_movement(&flow("entree", 1, "consignes", "B6", 70), today()).await.unwrap();
    let second = service.record_movement(&flow("entree", 2, "consignes", "B6", 30), today()).await.unwrap();
    assert_eq!(service.current_stock(lineage).await.unwrap(), 100);

    service.store().fail_lists(true);
    assert!(matches!(
        service.delete_movement(second[0].id).await,
        Err(AppError::Store(_))
    ));
    service.store().fail_lists(false);

    assert_eq!(service.current_stock(lineage).await.unwrap(), 70);
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn test_summary_excludes_sigma_by_category() {
    let service = service();
    service.record_movement(&flow("entree", 1, "consignes", "B12", 40), today()).await.unwrap();
    service.record_movement(&flow("entree", 1, "sigma", "B12", 15), today()).await.unwrap();

    let by_category = service.summarize(DateWindow::all(), GroupingDimension::Category).await.unwrap();
    assert_eq!(by_category.total.entries, 55);
    assert_eq!(by_category.bucket_sum().entries, 40);

    let by_site = service.summarize(DateWindow::all(), GroupingDimension::Site).await.unwrap();
    assert_eq!(by_site.bucket_sum().entries, 55);

    let stats = service.stats(DateWindow::all()).await.unwrap();
    assert_eq!(stats.movements, 2);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Cached rows always match a full rebuild, whatever the write order
    #[test]
    fn prop_cache_matches_full_rebuild(
        writes in prop::collection::vec((1u32..28, 0i32..3, 0i32..200), 1..20),
        checkpoint_replay in any::<bool>()
    ) {
        tokio_test::block_on(async {
            let service = StockLedgerService::new(
                InMemoryMovementStore::new(),
                LedgerConfig { discrepancy_threshold: 10, checkpoint_replay },
                AlertsConfig::default(),
            );
            for (d, kind, quantity) in writes {
                let raw = match kind {
                    0 => flow("entree", d, "consignes", "B12", quantity),
                    1 => flow("sortie", d, "consignes", "B12", quantity),
                    _ => count(d, "consignes", "B12", quantity),
                };
                service.record_movement(&raw, today()).await.unwrap();
            }

            let lineage = key(Category::Consignes, BottleType::B12);
            let cached = service.lineage_entries(lineage).await.unwrap();
            let rebuilt = service.ledger().await.unwrap();
            assert_eq!(cached.as_slice(), rebuilt.entries(&lineage));
        });
    }
}
