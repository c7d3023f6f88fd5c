mod helper;
mod resolver;
mod store;

pub use helper::CredentialHelperConfig;
pub use resolver::CredentialResolver;
pub use store::{CredentialStore, InMemoryCredentialStore};
