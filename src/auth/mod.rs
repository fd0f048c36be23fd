// Authentication module
// Manages the token lifecycle, the credential record and session expiry

mod credentials;
mod manager;
mod privileges;
mod refresh;
mod session;
pub mod token;
mod types;

pub use credentials::{apply_grant, parse_privileges};
pub use manager::TokenManager;
pub(crate) use manager::bearer;
pub use privileges::PrivilegeCache;
pub use refresh::{refresh_url, REFRESH_PATH};
pub use session::{SessionExpiry, DEFAULT_REDIRECT_COOLDOWN, SESSION_EXPIRED_MESSAGE};
pub use types::{Credentials, TokenGrant};
