//! Domain types shared by every bulksync crate.
//!
//! - [`ApplicationRecord`]: what the registry says should run
//! - [`Recipe`]: the executable specification written to the store
//! - [`RecipeBuilder`]: the pure translation between the two

pub mod app;
pub mod builder;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod recipe;

pub use app::{ApplicationRecord, EnvironmentVariable};
pub use builder::RecipeBuilder;
pub use error::{BundleMappingError, RecipeError};
pub use id::{IdError, ProcessGuid};
pub use lifecycle::LifecycleBundles;
pub use recipe::{HealthMonitor, LogConfig, Recipe, RecipeAction};
