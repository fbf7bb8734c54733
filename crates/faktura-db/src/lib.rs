//! Faktura DB - Subscription store
//!
//! SQLx-based database layer for Faktura services.
//!
//! # Example
//!
//! ```rust,ignore
//! use faktura_db::{create_pool, Repositories};
//!
//! let pool = create_pool("postgres://localhost/faktura").await?;
//! let repos = Repositories::new(pool);
//!
//! let sub = repos.subscriptions.find_latest_by_user(user_id).await?;
//! ```

pub mod error;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, DbPool};
pub use repo::*;
