//! Aggregates module
pub mod user;
pub mod store;
pub mod category;
pub mod product;
pub mod cart;
pub mod order;
pub mod payment;
pub mod review;

pub use user::{Address, Role, User, UserStatus};
pub use store::{Store, StoreStatus, StoreTransitionError};
pub use category::Category;
pub use product::{Product, ProductChanges, ProductError, ProductStatus, RatingSummary, ResolvedVariant, Variant};
pub use cart::{Cart, CartError, CartLine};
pub use order::{LineItem, Order, OrderError, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus, StatusChange};
pub use payment::{Payment, TransactionStatus};
pub use review::Review;
