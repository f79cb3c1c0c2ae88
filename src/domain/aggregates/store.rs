//! Store Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::events::{DomainEvent, StoreEvent};
use crate::domain::value_objects::slugify;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub status: StoreStatus,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus { #[default] Pending, Approved, Rejected, Suspended }

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Store cannot move from {from:?} to {to:?}")]
pub struct StoreTransitionError { pub from: StoreStatus, pub to: StoreStatus }

impl StoreStatus {
    pub fn can_become(self, to: StoreStatus) -> bool {
        use StoreStatus::*;
        matches!((self, to), (Pending, Approved) | (Pending, Rejected) | (Approved, Suspended) | (Suspended, Approved) | (Rejected, Pending))
    }
}

impl Store {
    pub fn apply(owner_id: Uuid, name: impl Into<String>, description: Option<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), owner_id, slug: slugify(&name), name, description, logo_url: None,
            status: StoreStatus::Pending, review_note: None, created_at: now, updated_at: now,
        }
    }

    pub fn is_approved(&self) -> bool { self.status == StoreStatus::Approved }

    pub fn transition(&mut self, to: StoreStatus, note: Option<String>) -> Result<DomainEvent, StoreTransitionError> {
        let from = self.status;
        if !from.can_become(to) { return Err(StoreTransitionError { from, to }); }
        self.status = to;
        self.review_note = note;
        self.updated_at = Utc::now();
        Ok(DomainEvent::Store(StoreEvent::StatusChanged { store_id: self.id, from, to }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_approval_flow() {
        let mut store = Store::apply(Uuid::now_v7(), "Green Grocer", None);
        assert_eq!(store.slug, "green-grocer");
        store.transition(StoreStatus::Rejected, Some("missing documents".into())).unwrap();
        store.transition(StoreStatus::Pending, None).unwrap();
        store.transition(StoreStatus::Approved, None).unwrap();
        assert!(store.is_approved());
        let err = store.transition(StoreStatus::Rejected, None).unwrap_err();
        assert_eq!(err, StoreTransitionError { from: StoreStatus::Approved, to: StoreStatus::Rejected });
    }
}
