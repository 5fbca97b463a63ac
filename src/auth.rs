//! Credential identity, token bookkeeping, and the authorizer family.

pub mod authenticator;
pub mod authorizer;
pub mod scope;
pub mod token;

pub use authenticator::*;
pub use authorizer::*;
pub use scope::*;
pub use token::*;
