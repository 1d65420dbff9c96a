pub mod deliveries;
mod error;
pub mod inventory;
pub mod preferences;
pub mod subscriptions;

pub use error::{RestError, RestResult};
