mod email_address;
mod entity;

pub use email_address::EmailAddress;
pub use entity::Entity;
