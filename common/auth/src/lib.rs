pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod extractors;

pub use claims::SessionClaims;
pub use codec::TokenCodec;
pub use config::TokenConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::parse_bearer;
