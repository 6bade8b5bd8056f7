//! Wallet sign-in: challenge nonces and ed25519 signature checks
//!
//! A wallet address is the hex-encoded 32-byte ed25519 public key. The client
//! asks for a challenge, signs the exact message bytes and posts the hex
//! signature back. Challenges are single-use, and the same flow proves key
//! ownership when such an address is connected to an existing account.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ed25519_dalek::{Signature, VerifyingKey};
use rand::RngCore;
use tracing::debug;

/// How long an issued challenge stays valid
pub const CHALLENGE_TTL_SECS: i64 = 300;

/// Whether `address` has the shape of a hex-encoded ed25519 public key.
/// Such addresses can sign in, so binding one to an account needs proof.
pub fn is_key_address(address: &str) -> bool {
    address.len() == 64 && address.chars().all(|c| c.is_ascii_hexdigit())
}

/// Verify a hex signature over `message` by the key encoded in `address_hex`.
///
/// Malformed keys and signatures verify as false.
pub fn verify_signature(address_hex: &str, message: &str, signature_hex: &str) -> bool {
    let Ok(key_bytes) = hex::decode(address_hex) else {
        return false;
    };
    let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);

    key.verify_strict(message.as_bytes(), &signature).is_ok()
}

#[derive(Debug, Clone)]
struct Challenge {
    message: String,
    expires_at: DateTime<Utc>,
}

/// Outstanding challenges keyed by wallet address
#[derive(Default)]
pub struct ChallengeStore {
    pending: DashMap<String, Challenge>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh challenge for `address`, replacing any earlier one.
    /// Returns the message to sign and its expiry.
    pub fn issue(&self, address: &str, now: DateTime<Utc>) -> (String, DateTime<Utc>) {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let expires_at = now + Duration::seconds(CHALLENGE_TTL_SECS);
        let message = format!(
            "Sign in to tokenpost\naddress: {}\nnonce: {}\nissued: {}",
            address,
            hex::encode(nonce),
            now.to_rfc3339()
        );

        self.pending.insert(
            address.to_string(),
            Challenge {
                message: message.clone(),
                expires_at,
            },
        );
        self.prune(now);

        (message, expires_at)
    }

    /// Take the challenge for `address` if `message` matches it and it has
    /// not expired. A matching challenge is removed either way.
    pub fn consume(&self, address: &str, message: &str, now: DateTime<Utc>) -> bool {
        let Some((_, challenge)) = self
            .pending
            .remove_if(address, |_, c| c.message == message)
        else {
            return false;
        };
        challenge.expires_at > now
    }

    fn prune(&self, now: DateTime<Utc>) {
        let before = self.pending.len();
        self.pending.retain(|_, c| c.expires_at > now);
        let removed = before.saturating_sub(self.pending.len());
        if removed > 0 {
            debug!(removed, "Pruned expired wallet challenges");
        }
    }
}
