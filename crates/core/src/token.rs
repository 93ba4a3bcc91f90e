//! Signed state tokens.
//!
//! An [`ApplicationState`] is serialized, authenticated with HMAC-SHA256
//! under a process-wide secret, and packed into a single opaque string:
//! `base64url(payload) + "." + base64url(mac)`. The token is the sole record
//! for an in-flight application, so it must survive process restarts: any
//! signer built from the same secret verifies any previously issued token.
//!
//! Tokens carry no expiry. They are short-lived by user interaction speed,
//! and statelessness across restarts is the point.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use crate::state::ApplicationState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token signature does not verify")]
    InvalidSignature,
}

/// Signs and verifies application-state tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
}

impl TokenSigner {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Serialize `state` and return it with an integrity signature attached.
    pub fn sign(&self, state: &ApplicationState) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(state)
            .map_err(|error| TokenError::Malformed(format!("payload encoding failed: {error}")))?;
        let mut mac = self.keyed_mac()?;
        mac.update(&payload);
        let tag = mac.finalize().into_bytes();

        Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Recover the state carried by `token`, rejecting any tampering.
    pub fn verify(&self, token: &str) -> Result<ApplicationState, TokenError> {
        let (payload_b64, tag_b64) = token
            .rsplit_once('.')
            .ok_or_else(|| TokenError::Malformed("missing signature separator".to_owned()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|error| TokenError::Malformed(format!("payload decoding failed: {error}")))?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|error| TokenError::Malformed(format!("signature decoding failed: {error}")))?;

        let mut mac = self.keyed_mac()?;
        mac.update(&payload);
        mac.verify_slice(&tag).map_err(|_| TokenError::InvalidSignature)?;

        serde_json::from_slice(&payload)
            .map_err(|error| TokenError::Malformed(format!("payload deserialization failed: {error}")))
    }

    fn keyed_mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|error| TokenError::Malformed(format!("signing key rejected: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenError, TokenSigner};
    use crate::state::ApplicationState;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-signing-secret".to_owned().into())
    }

    fn sample_state() -> ApplicationState {
        ApplicationState::detected("https://example.com", "U0123456", "1730000000.1000")
    }

    #[test]
    fn verify_round_trips_a_signed_state() {
        let signer = signer();
        let state = sample_state();

        let token = signer.sign(&state).expect("sign");
        let recovered = signer.verify(&token).expect("verify");

        assert_eq!(recovered, state);
    }

    #[test]
    fn verify_round_trips_every_step_shape() {
        let signer = signer();
        let states = [
            sample_state(),
            sample_state().with_status_ts("1730000000.2000"),
            sample_state()
                .with_status_ts("1730000000.2000")
                .with_external_id("8b35f4a1-9c5d-4a6e-9d2f-0c1b2a3d4e5f"),
        ];

        for state in states {
            let token = signer.sign(&state).expect("sign");
            assert_eq!(signer.verify(&token).expect("verify"), state);
        }
    }

    #[test]
    fn flipping_any_character_fails_verification() {
        let signer = signer();
        let token = signer.sign(&sample_state()).expect("sign");

        for index in 0..token.len() {
            let mut tampered: Vec<char> = token.chars().collect();
            tampered[index] = if tampered[index] == 'A' { 'B' } else { 'A' };
            let tampered: String = tampered.into_iter().collect();
            if tampered == token {
                continue;
            }

            assert!(
                signer.verify(&tampered).is_err(),
                "tampered token at index {index} should not verify"
            );
        }
    }

    #[test]
    fn token_without_separator_is_malformed() {
        let result = signer().verify("no-separator-here");
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }

    #[test]
    fn token_with_undecodable_payload_is_malformed() {
        let result = signer().verify("!!!not-base64!!!.AAAA");
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }

    #[test]
    fn token_signed_under_a_different_secret_is_rejected() {
        let token = signer().sign(&sample_state()).expect("sign");
        let other = TokenSigner::new("a-different-secret".to_owned().into());

        assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn token_survives_a_process_restart() {
        // A fresh signer over the same secret stands in for the restarted
        // process; no other server-side state may be required.
        let token = signer().sign(&sample_state()).expect("sign");
        let restarted = TokenSigner::new("test-signing-secret".to_owned().into());

        assert_eq!(restarted.verify(&token).expect("verify"), sample_state());
    }

    #[test]
    fn nothing_beyond_the_record_is_recoverable_without_the_secret() {
        let token = signer().sign(&sample_state()).expect("sign");
        // The payload half is plain base64; the signature half must not leak
        // the secret through its encoding.
        let (_, tag) = token.rsplit_once('.').expect("separator");
        assert!(!tag.contains("test-signing-secret"));
    }
}
