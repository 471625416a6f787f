//! The clothing inventory: item model, tenant-partitioned storage and the
//! `/clothes` routes.

mod handlers;
mod model;
mod repository;

pub use handlers::*;
pub use model::*;
pub use repository::*;
