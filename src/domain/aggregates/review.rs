//! Product review written by a verified buyer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub rating: u8,
    pub title: Option<String>,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Returns `None` when the rating is outside 1..=5.
    pub fn write(product_id: Uuid, user_id: Uuid, order_id: Uuid, rating: u8, title: Option<String>, body: Option<String>) -> Option<Self> {
        (1..=5).contains(&rating).then(|| Self {
            id: Uuid::now_v7(), product_id, user_id, order_id, rating, title, body, created_at: Utc::now(),
        })
    }
}
