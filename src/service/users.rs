use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::user::normalize_email;
use crate::domain::aggregates::{Address, Role, StoreStatus, User, UserStatus};
use crate::service::{contains_ci, non_blank, Actor, Marketplace, PageRequest, PaginatedResponse};
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileChanges {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
}

impl Marketplace {
    /// Resolves the user a request claims to be.
    pub async fn authenticate(&self, user_id: Uuid) -> Result<Actor> {
        let user: User = self.storage.find(&user_id.to_string()).await?.ok_or(EcommerceError::Unauthenticated)?;
        if user.is_blocked() { return Err(EcommerceError::Forbidden("account blocked".into())); }
        Ok(Actor { user })
    }

    pub async fn register(&self, req: NewUser) -> Result<User> {
        req.validate()?;
        if req.role == Role::Admin { return Err(EcommerceError::Forbidden("admins cannot self-register".into())); }
        self.ensure_email_free(&req.email, None).await?;
        let mut user = User::register(req.name.trim(), &req.email, req.role);
        user.phone = non_blank(req.phone);
        self.storage.save(&user).await?;
        info!(user_id = %user.id, role = ?user.role, "user registered");
        Ok(user)
    }

    /// Makes sure an admin with `email` exists, promoting an existing user if needed.
    pub async fn bootstrap_admin(&self, email: &str) -> Result<User> {
        let email = normalize_email(email);
        let existing = self.storage.list_where::<User>(|u| u.email == email).await?.into_iter().next();
        let user = match existing {
            Some(user) if user.is_admin() => return Ok(user),
            Some(mut user) => {
                user.role = Role::Admin;
                user.unblock();
                user
            }
            None => User::register("Administrator", &email, Role::Admin),
        };
        self.storage.save(&user).await?;
        info!(user_id = %user.id, %email, "admin bootstrapped");
        Ok(user)
    }

    pub async fn get_user(&self, actor: &Actor, user_id: Uuid) -> Result<User> {
        actor.require_self_or_admin(user_id)?;
        self.load_user(user_id).await
    }

    pub async fn list_users(&self, actor: &Actor, filter: UserFilter, page: PageRequest) -> Result<PaginatedResponse<User>> {
        actor.require_admin()?;
        let search = non_blank(filter.search);
        let users = self.storage.list_where::<User>(|u| {
            filter.role.map_or(true, |r| u.role == r)
                && filter.status.map_or(true, |s| u.status == s)
                && search.as_deref().map_or(true, |q| contains_ci(&u.name, q) || contains_ci(&u.email, q))
        }).await?;
        Ok(PaginatedResponse::paginate(users, page))
    }

    pub async fn update_profile(&self, actor: &Actor, user_id: Uuid, changes: ProfileChanges) -> Result<User> {
        actor.require_self_or_admin(user_id)?;
        changes.validate()?;
        let mut user = self.load_user(user_id).await?;
        if let Some(email) = changes.email {
            self.ensure_email_free(&email, Some(user_id)).await?;
            user.email = normalize_email(&email);
        }
        if let Some(name) = non_blank(changes.name) { user.name = name; }
        if changes.phone.is_some() { user.phone = non_blank(changes.phone); }
        user.touch();
        self.storage.update(&user).await?;
        Ok(user)
    }

    pub async fn set_user_blocked(&self, actor: &Actor, user_id: Uuid, blocked: bool) -> Result<User> {
        actor.require_admin()?;
        if actor.id() == user_id { return Err(EcommerceError::Conflict("cannot change your own access".into())); }
        let mut user = self.load_user(user_id).await?;
        if blocked { user.block() } else { user.unblock() }
        self.storage.update(&user).await?;
        info!(user_id = %user_id, blocked, by = %actor.id(), "user access changed");
        Ok(user)
    }

    /// A deleted seller's store stops trading: approved stores are suspended
    /// and pending applications rejected.
    pub async fn delete_user(&self, actor: &Actor, user_id: Uuid) -> Result<()> {
        actor.require_self_or_admin(user_id)?;
        let user = self.load_user(user_id).await?;
        if user.role == Role::Seller {
            if let Some(store) = self.store_of(user_id).await? {
                let closed = match store.status {
                    StoreStatus::Approved => Some(StoreStatus::Suspended),
                    StoreStatus::Pending => Some(StoreStatus::Rejected),
                    StoreStatus::Rejected | StoreStatus::Suspended => None,
                };
                if let Some(to) = closed {
                    self.move_store(actor, store.id, to, Some("owner account deleted".into())).await?;
                }
            }
        }
        if !self.storage.remove::<User>(&user_id.to_string()).await? {
            return Err(EcommerceError::NotFound("User"));
        }
        info!(user_id = %user_id, by = %actor.id(), "user deleted");
        Ok(())
    }

    pub async fn add_address(&self, actor: &Actor, user_id: Uuid, address: Address) -> Result<User> {
        actor.require_self_or_admin(user_id)?;
        if [&address.line1, &address.city, &address.postal_code, &address.country].iter().any(|f| f.trim().is_empty()) {
            return Err(EcommerceError::Validation("line1, city, postal_code and country are required".into()));
        }
        let mut user = self.load_user(user_id).await?;
        user.add_address(address);
        self.storage.update(&user).await?;
        Ok(user)
    }

    pub async fn remove_address(&self, actor: &Actor, user_id: Uuid, address_id: Uuid) -> Result<User> {
        actor.require_self_or_admin(user_id)?;
        let mut user = self.load_user(user_id).await?;
        if !user.remove_address(address_id) { return Err(EcommerceError::NotFound("Address")); }
        self.storage.update(&user).await?;
        Ok(user)
    }

    pub async fn set_default_address(&self, actor: &Actor, user_id: Uuid, address_id: Uuid) -> Result<User> {
        actor.require_self_or_admin(user_id)?;
        let mut user = self.load_user(user_id).await?;
        if !user.set_default_address(address_id) { return Err(EcommerceError::NotFound("Address")); }
        self.storage.update(&user).await?;
        Ok(user)
    }

    pub(crate) async fn load_user(&self, user_id: Uuid) -> Result<User> {
        self.storage.find(&user_id.to_string()).await?.ok_or(EcommerceError::NotFound("User"))
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> Result<()> {
        let email = normalize_email(email);
        let taken = self.storage.list_where::<User>(|u| u.email == email && Some(u.id) != except).await?;
        if taken.is_empty() { Ok(()) } else { Err(EcommerceError::Conflict("email already registered".into())) }
    }
}
