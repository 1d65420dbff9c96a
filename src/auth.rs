mod credentials;
mod operator_guard;

pub use credentials::Credentials;
pub use operator_guard::{Operator, OperatorCredentials};
