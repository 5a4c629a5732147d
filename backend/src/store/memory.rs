use std::collections::HashMap;

use shared::Movement;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MovementFilter, MovementStore};
use crate::error::{AppError, AppResult};

/// Movement store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryMovementStore {
    movements: RwLock<HashMap<Uuid, Movement>>,
}

impl InMemoryMovementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `movements`, ids kept as given
    pub fn with_movements(movements: impl IntoIterator<Item = Movement>) -> Self {
        Self {
            movements: RwLock::new(movements.into_iter().map(|m| (m.id, m)).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.movements.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.movements.read().await.is_empty()
    }
}

impl MovementStore for InMemoryMovementStore {
    async fn append(&self, movement: Movement) -> AppResult<Uuid> {
        let mut ids = self.append_all(vec![movement]).await?;
        ids.pop()
            .ok_or_else(|| AppError::Internal("append returned no id".to_string()))
    }

    async fn append_all(&self, movements: Vec<Movement>) -> AppResult<Vec<Uuid>> {
        let mut store = self.movements.write().await;
        for (i, movement) in movements.iter().enumerate() {
            let repeated = movements[..i].iter().any(|m| m.id == movement.id);
            if repeated || store.contains_key(&movement.id) {
                return Err(AppError::Store(format!("duplicate movement id {}", movement.id)));
            }
        }

        let ids = movements.iter().map(|m| m.id).collect();
        store.extend(movements.into_iter().map(|m| (m.id, m)));
        Ok(ids)
    }

    async fn list(&self, filter: MovementFilter) -> AppResult<Vec<Movement>> {
        let store = self.movements.read().await;
        Ok(store.values().filter(|m| filter.matches(m)).cloned().collect())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Movement>> {
        Ok(self.movements.read().await.get(&id).cloned())
    }

    async fn delete_all(&self, ids: Vec<Uuid>) -> AppResult<()> {
        let mut store = self.movements.write().await;
        if let Some(missing) = ids.iter().find(|id| !store.contains_key(id)) {
            return Err(AppError::NotFound(format!("Movement {}", missing)));
        }
        for id in ids {
            store.remove(&id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use shared::{BottleType, Category, DateWindow, LineageKey, MovementKind, NewMovement};

    fn movement(category: Category, day: u32) -> Movement {
        NewMovement {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            lineage: LineageKey::new(category, BottleType::B6, None),
            kind: MovementKind::Incoming {
                quantity: 1,
                source: None,
            },
            document_ref: None,
            origin: None,
            notes: None,
        }
        .into_movement(Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn test_list_filters() {
        let a = movement(Category::Consignes, 1);
        let b = movement(Category::StockOutils, 3);
        let store = InMemoryMovementStore::with_movements(vec![a.clone(), b.clone()]);

        let by_lineage = store.list(MovementFilter::lineage(a.lineage)).await.unwrap();
        assert_eq!(by_lineage, vec![a]);

        let window = DateWindow::new(Some(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()), None);
        let by_window = store.list(MovementFilter::window(window)).await.unwrap();
        assert_eq!(by_window, vec![b]);
    }

    #[tokio::test]
    async fn test_append_all_is_atomic() {
        let store = InMemoryMovementStore::new();
        let existing = movement(Category::Consignes, 1);
        store.append(existing.clone()).await.unwrap();

        let fresh = movement(Category::Consignes, 2);
        let result = store.append_all(vec![fresh.clone(), existing]).await;

        assert!(matches!(result, Err(AppError::Store(_))));
        assert_eq!(store.len().await, 1);
        assert!(store.get(fresh.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_keeps_everything() {
        let kept = movement(Category::Consignes, 1);
        let store = InMemoryMovementStore::with_movements(vec![kept.clone()]);

        let result = store.delete_all(vec![kept.id, Uuid::new_v4()]).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.len().await, 1);

        store.delete(kept.id).await.unwrap();
        assert!(store.is_empty().await);
    }
}
