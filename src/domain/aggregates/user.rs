//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub addresses: Vec<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { #[default] Customer, Seller, Admin }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus { #[default] Active, Blocked }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub id: Uuid,
    pub label: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
}

impl User {
    pub fn register(name: impl Into<String>, email: &str, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: name.into(), email: normalize_email(email), phone: None,
            role, status: UserStatus::Active, addresses: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
    pub fn is_blocked(&self) -> bool { self.status == UserStatus::Blocked }

    pub fn block(&mut self) { self.status = UserStatus::Blocked; self.touch(); }
    pub fn unblock(&mut self) { self.status = UserStatus::Active; self.touch(); }

    /// The first address added becomes the default; a new default demotes the rest.
    pub fn add_address(&mut self, mut address: Address) -> &Address {
        address.id = Uuid::now_v7();
        if self.addresses.is_empty() { address.is_default = true; }
        if address.is_default { self.addresses.iter_mut().for_each(|a| a.is_default = false); }
        self.addresses.push(address);
        self.touch();
        &self.addresses[self.addresses.len() - 1]
    }

    pub fn remove_address(&mut self, address_id: Uuid) -> bool {
        let before = self.addresses.len();
        let was_default = self.addresses.iter().any(|a| a.id == address_id && a.is_default);
        self.addresses.retain(|a| a.id != address_id);
        if self.addresses.len() == before { return false; }
        if was_default {
            if let Some(first) = self.addresses.first_mut() { first.is_default = true; }
        }
        self.touch();
        true
    }

    pub fn set_default_address(&mut self, address_id: Uuid) -> bool {
        if !self.addresses.iter().any(|a| a.id == address_id) { return false; }
        self.addresses.iter_mut().for_each(|a| a.is_default = a.id == address_id);
        self.touch();
        true
    }

    pub fn address(&self, address_id: Uuid) -> Option<&Address> { self.addresses.iter().find(|a| a.id == address_id) }
    pub fn default_address(&self) -> Option<&Address> { self.addresses.iter().find(|a| a.is_default) }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }
