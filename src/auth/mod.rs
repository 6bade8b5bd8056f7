//! Authentication
//!
//! - `jwt`: HS256 session tokens
//! - `wallet`: sign-in challenges and ed25519 signature checks
//! - `principal`: request extractors handing handlers a typed caller

pub mod jwt;
pub mod principal;
pub mod wallet;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, PrincipalKind, TokenInput};
pub use principal::{MaybePrincipal, Principal};
pub use wallet::{is_key_address, verify_signature, ChallengeStore};
