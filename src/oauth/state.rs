use crate::crypto::{generate_random, Encryptor};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid state encoding")]
    Encoding,

    #[error("invalid state payload")]
    Payload,

    #[error("incomplete state payload")]
    Incomplete,
}

/// Carried through the provider's redirect so the callback can recover the
/// originating tenant and the final redirect target. The nonce makes every
/// state unique and unpredictable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub tenant_id: Uuid,
    pub redirect_uri: String,
    pub nonce: String,
}

/// Encodes a state parameter for `tenant_id`. The JSON payload is sealed
/// under the root key before base64url encoding, so a state that was tampered
/// with, or forged for a known tenant id, fails to decode.
pub fn encode_state(
    enc: &Encryptor,
    tenant_id: Uuid,
    redirect_uri: &str,
) -> Result<String, StateError> {
    let payload = StatePayload {
        tenant_id,
        redirect_uri: redirect_uri.to_string(),
        nonce: URL_SAFE_NO_PAD.encode(generate_random::<16>()),
    };
    let json = serde_json::to_vec(&payload).map_err(|_| StateError::Payload)?;
    let sealed = enc.seal(&json).map_err(|_| StateError::Payload)?;
    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

/// Decodes and validates the state parameter from an OAuth callback.
pub fn decode_state(enc: &Encryptor, state: &str) -> Result<StatePayload, StateError> {
    let sealed = URL_SAFE_NO_PAD
        .decode(state)
        .map_err(|_| StateError::Encoding)?;
    let json = enc.open(&sealed).map_err(|_| StateError::Payload)?;
    let payload: StatePayload = serde_json::from_slice(&json).map_err(|_| StateError::Payload)?;

    if payload.tenant_id.is_nil() || payload.redirect_uri.is_empty() || payload.nonce.is_empty() {
        return Err(StateError::Incomplete);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ROOT_KEY: &str =
        "0303030303030303030303030303030303030303030303030303030303030303";

    #[test]
    fn state_round_trip() {
        let enc = Encryptor::new(TEST_ROOT_KEY).unwrap();
        let tenant_id = Uuid::new_v4();

        let state = encode_state(&enc, tenant_id, "https://r/ok").unwrap();
        let payload = decode_state(&enc, &state).unwrap();

        assert_eq!(payload.tenant_id, tenant_id);
        assert_eq!(payload.redirect_uri, "https://r/ok");
        assert!(!payload.nonce.is_empty());
    }

    #[test]
    fn states_are_unique_for_same_inputs() {
        let enc = Encryptor::new(TEST_ROOT_KEY).unwrap();
        let tenant_id = Uuid::new_v4();

        let a = encode_state(&enc, tenant_id, "https://r/ok").unwrap();
        let b = encode_state(&enc, tenant_id, "https://r/ok").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn mutated_state_is_rejected() {
        let enc = Encryptor::new(TEST_ROOT_KEY).unwrap();
        let state = encode_state(&enc, Uuid::new_v4(), "https://r/ok").unwrap();

        let mut chars: Vec<char> = state.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let mutated: String = chars.into_iter().collect();

        assert!(decode_state(&enc, &mutated).is_err());
    }

    #[test]
    fn state_from_another_process_key_is_rejected() {
        let enc = Encryptor::new(TEST_ROOT_KEY).unwrap();
        let other = Encryptor::new(&"04".repeat(32)).unwrap();

        let state = encode_state(&other, Uuid::new_v4(), "https://r/ok").unwrap();
        assert!(matches!(
            decode_state(&enc, &state),
            Err(StateError::Payload)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let enc = Encryptor::new(TEST_ROOT_KEY).unwrap();
        assert!(matches!(
            decode_state(&enc, "not!base64!"),
            Err(StateError::Encoding)
        ));
        assert!(decode_state(&enc, "YWJjZGVm").is_err());
    }
}
