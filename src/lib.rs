pub mod api;
pub mod config;
pub mod dto;
pub mod error;
pub mod metrics;
pub mod models;
pub mod router;
pub mod state;
pub mod storage;

pub use self::config::*;
pub use dto::*;
pub use error::*;
pub use models::*;
pub use router::*;
pub use state::*;
pub use storage::*;
