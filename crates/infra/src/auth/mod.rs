//! Authentication: credential exchanges and the shared session lifecycle.

pub mod exchange;
pub mod manager;
pub mod session;

pub use exchange::{
    obfuscate_api_key, ApiKeyExchange, ClientCredentialsExchange, CredentialExchange,
};
pub use manager::SessionManager;
pub use session::{IssuedSession, Session, SessionCredential};
