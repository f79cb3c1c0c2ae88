use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Order, OrderStatus, Product, RatingSummary, Review};
use crate::service::{non_blank, Actor, Marketplace, PageRequest, PaginatedResponse};
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct NewReview {
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[validate(length(max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub body: Option<String>,
}

impl Marketplace {
    /// Only customers who received the product may review it, once.
    pub async fn create_review(&self, actor: &Actor, product_id: Uuid, req: NewReview) -> Result<Review> {
        req.validate()?;
        self.load_product(product_id).await?;
        let me = actor.id();
        let delivered = self.storage.list_where::<Order>(|o| {
            o.customer_id() == me && o.status() == OrderStatus::Delivered && o.items().iter().any(|i| i.product_id == product_id)
        }).await?;
        let order = delivered.first().ok_or_else(|| EcommerceError::Forbidden("only customers who received this product may review it".into()))?;
        let existing = self.storage.list_where::<Review>(|r| r.product_id == product_id && r.user_id == me).await?;
        if !existing.is_empty() { return Err(EcommerceError::Conflict("product already reviewed".into())); }

        let review = Review::write(product_id, me, order.id(), req.rating, non_blank(req.title), non_blank(req.body))
            .ok_or_else(|| EcommerceError::Validation("rating must be between 1 and 5".into()))?;
        self.storage.save(&review).await?;
        self.refresh_rating(product_id).await?;
        info!(review_id = %review.id, product_id = %product_id, rating = review.rating, "review created");
        Ok(review)
    }

    pub async fn list_reviews(&self, product_id: Uuid, page: PageRequest) -> Result<PaginatedResponse<Review>> {
        let mut reviews = self.storage.list_where::<Review>(|r| r.product_id == product_id).await?;
        reviews.reverse();
        Ok(PaginatedResponse::paginate(reviews, page))
    }

    pub async fn delete_review(&self, actor: &Actor, review_id: Uuid) -> Result<()> {
        let review: Review = self.storage.find(&review_id.to_string()).await?.ok_or(EcommerceError::NotFound("Review"))?;
        actor.require_self_or_admin(review.user_id)?;
        self.storage.remove::<Review>(&review_id.to_string()).await?;
        self.refresh_rating(review.product_id).await?;
        info!(review_id = %review_id, by = %actor.id(), "review deleted");
        Ok(())
    }

    async fn refresh_rating(&self, product_id: Uuid) -> Result<()> {
        let Some(mut product) = self.storage.find::<Product>(&product_id.to_string()).await? else {
            return Ok(());
        };
        let ratings = self.storage.list_where::<Review>(|r| r.product_id == product_id).await?;
        product.set_rating(RatingSummary::from_ratings(ratings.iter().map(|r| r.rating)));
        self.storage.update(&product).await?;
        Ok(())
    }
}
