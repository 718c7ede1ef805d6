// Copyright 2026 Escrow Core Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

//! Oracle data-signature scheme authorizing one covenant path.
//!
//! The oracle signs an application-level message, `wire(action) || nonce`,
//! with a plain ECDSA data signature over the message's single SHA-256
//! digest. This is deliberately distinct from the transaction-level
//! signature scheme in [`crate::sighash`]: the authorization is independent
//! of which UTXO is eventually spent, so it can be produced before the
//! spending transaction is formed.
//!
//! Verification normally happens inside the script at spend time; a wrong
//! private key yields a signature that fails the covenant's hash-equality
//! check on-chain, not a local error. [`verify_action`] exists for local
//! preflight only.

use std::fmt;

use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey, Signing, Verification};
use serde::de;
use serde::ser::{Serialize, Serializer};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::action::ActionCode;

/// Errors when constructing oracle material.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A nonce must carry at least one byte.
    #[error("Empty nonce")]
    EmptyNonce,
    /// Nonce hex artifact failed to decode.
    #[error("Nonce parsing error: {0}")]
    ParseFailed(#[from] hex::FromHexError),
    /// Signature bytes are not valid DER.
    #[error("Signature error: {0}")]
    Signature(#[from] bitcoin::secp256k1::Error),
}

/// Opaque per-order byte string embedded in the covenant and in every
/// oracle message of that order. Reused verbatim across the six potential
/// authorizations of one order, never across orders; replaying a signature
/// against another order fails the data-signature check because the other
/// order's script carries a different nonce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(Vec<u8>);

impl Nonce {
    /// Wrap raw bytes, rejecting the empty string.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::EmptyNonce);
        }
        Ok(Nonce(bytes))
    }

    /// Conventional nonce: the order creation time as an ASCII decimal
    /// string of milliseconds.
    pub fn from_unix_millis(millis: u64) -> Self {
        Nonce(millis.to_string().into_bytes())
    }

    /// Raw bytes, as embedded in the covenant script.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl Serialize for Nonce {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D>(deserializer: D) -> Result<Nonce, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = hex::decode(String::deserialize(deserializer)?).map_err(de::Error::custom)?;
        Nonce::new(bytes).map_err(de::Error::custom)
    }
}

/// A data signature over `sha256(wire(action) || nonce)`, produced by the
/// oracle role selected by the action code. Never reused for a different
/// action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleSignature(Signature);

impl OracleSignature {
    /// DER bytes, as pushed on the unlocking stack (no sighash-type byte;
    /// this is not a transaction signature).
    pub fn to_der(self) -> Vec<u8> {
        self.0.serialize_der().to_vec()
    }

    /// Parse DER bytes received from a collaborator.
    pub fn from_der(bytes: &[u8]) -> Result<Self, Error> {
        Ok(OracleSignature(Signature::from_der(bytes)?))
    }

    /// Inner secp256k1 signature.
    pub fn as_signature(&self) -> &Signature {
        &self.0
    }
}

impl fmt::Display for OracleSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_der()))
    }
}

/// The exact byte string the oracle signs: the two-digit action wire value
/// concatenated directly (no length prefix) with the nonce.
pub fn oracle_message(action: ActionCode, nonce: &Nonce) -> Vec<u8> {
    let mut message = action.wire().to_vec();
    message.extend_from_slice(nonce.as_bytes());
    message
}

fn message_digest(action: ActionCode, nonce: &Nonce) -> Message {
    let digest = sha256::Hash::hash(&oracle_message(action, nonce));
    Message::from_slice(&digest.into_inner()).expect("32-byte digest")
}

/// Produce the authorization for one path of one order.
pub fn sign_action<C: Signing>(
    secp: &Secp256k1<C>,
    secret_key: &SecretKey,
    action: ActionCode,
    nonce: &Nonce,
) -> OracleSignature {
    OracleSignature(secp.sign_ecdsa(&message_digest(action, nonce), secret_key))
}

/// Local preflight check that a signature matches the claimed action and
/// oracle key. The covenant performs the authoritative check at spend time.
pub fn verify_action<C: Verification>(
    secp: &Secp256k1<C>,
    signature: &OracleSignature,
    action: ActionCode,
    nonce: &Nonce,
    oracle_key: &PublicKey,
) -> bool {
    secp.verify_ecdsa(&message_digest(action, nonce), &signature.0, oracle_key)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::Secp256k1;

    fn keypair(byte: u8) -> (SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        (sk, PublicKey::from_secret_key(&secp, &sk))
    }

    #[test]
    fn empty_nonce_rejected() {
        assert_eq!(Nonce::new(Vec::new()).unwrap_err(), Error::EmptyNonce);
    }

    #[test]
    fn timestamp_nonce_is_ascii_decimal() {
        let nonce = Nonce::from_unix_millis(1624299825441);
        assert_eq!(nonce.as_bytes(), b"1624299825441");
    }

    #[test]
    fn message_is_wire_then_nonce() {
        let nonce = Nonce::new(&b"1624299825441"[..]).unwrap();
        let message = oracle_message(ActionCode::ArbiReturn, &nonce);
        assert_eq!(message, b"041624299825441".to_vec());
    }

    #[test]
    fn sign_verify_round_trip() {
        let secp = Secp256k1::new();
        let (sk, pk) = keypair(7);
        let nonce = Nonce::from_unix_millis(1);
        let sig = sign_action(&secp, &sk, ActionCode::SellerRelease, &nonce);
        assert!(verify_action(
            &secp,
            &sig,
            ActionCode::SellerRelease,
            &nonce,
            &pk
        ));
    }

    #[test]
    fn signature_bound_to_action_and_nonce() {
        let secp = Secp256k1::new();
        let (sk, pk) = keypair(7);
        let nonce = Nonce::from_unix_millis(1);
        let sig = sign_action(&secp, &sk, ActionCode::SellerRelease, &nonce);
        // Other action, same nonce.
        assert!(!verify_action(
            &secp,
            &sig,
            ActionCode::BuyerReturn,
            &nonce,
            &pk
        ));
        // Same action, other order's nonce.
        let other = Nonce::from_unix_millis(2);
        assert!(!verify_action(
            &secp,
            &sig,
            ActionCode::SellerRelease,
            &other,
            &pk
        ));
    }

    #[test]
    fn der_round_trip() {
        let secp = Secp256k1::new();
        let (sk, _) = keypair(9);
        let nonce = Nonce::from_unix_millis(5);
        let sig = sign_action(&secp, &sk, ActionCode::ModRelease, &nonce);
        let restored = OracleSignature::from_der(&sig.to_der()).unwrap();
        assert_eq!(sig, restored);
    }

    #[test]
    fn nonce_serde_round_trip() {
        let nonce = Nonce::from_unix_millis(1624299825441);
        let yaml = serde_yaml::to_string(&nonce).unwrap();
        let restored: Nonce = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(nonce, restored);
    }
}
