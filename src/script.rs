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

//! Covenant locking script committing to the four participants' key hashes
//! and the per-order nonce.
//!
//! The redeem script dispatches on the action code sitting on top of the
//! unlocking stack with a cascading duplicate-compare-branch: each branch
//! pushes the selected spender and oracle key hashes to the altstack, then a
//! shared tail rebuilds the oracle message by concatenating the embedded
//! nonce to the presented action code, checks the presented oracle public
//! key against the committed hash, verifies the oracle's data signature,
//! checks the spender public key against its committed hash, and finally
//! checks the spender's transaction signature.
//!
//! The branches are generated from [`ActionCode::ALL`] so they cannot drift
//! from the role table.

use std::fmt;
use std::str::FromStr;

use bitcoin::blockdata::opcodes::{all, All};
use bitcoin::blockdata::script::{Builder, Instruction, Script};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::util::address::{Address, Payload};
use bitcoin::Network;
use serde::de;
use serde::ser::{Serialize, Serializer};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::action::ActionCode;
use crate::oracle::Nonce;
use crate::role::EscrowKeys;

/// Data-signature check over the single-SHA-256 digest of an arbitrary
/// message. Byte 0xba, which the shared opcode table names after another
/// ledger's semantics; aliased here under the covenant name.
pub const OP_CHECKDATASIG: All = all::OP_CHECKSIGADD;
/// [`OP_CHECKDATASIG`] followed by an implicit verify.
pub const OP_CHECKDATASIGVERIFY: All = all::OP_RETURN_187;

/// Errors when reconstructing a stored escrow script.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Hex artifact failed to decode.
    #[error("Script parsing error: {0}")]
    ParseFailed(#[from] hex::FromHexError),
    /// The bytecode does not scan as a sequence of instructions.
    #[error("Malformed script bytecode")]
    MalformedScript,
}

/// The locking script of one order. Built once at order creation, immutable
/// afterwards; its hash content-addresses the order and derives the escrow
/// deposit address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowScript {
    script: Script,
}

impl EscrowScript {
    /// Emit the six-branch redeem script for the given keys and nonce. Pure
    /// and deterministic: identical inputs produce byte-identical scripts.
    pub fn build(keys: &EscrowKeys, nonce: &Nonce) -> Self {
        let mut builder = Builder::new();
        let last = ActionCode::ALL.len() - 1;
        for (i, action) in ActionCode::ALL.iter().enumerate() {
            builder = builder
                .push_opcode(all::OP_DUP)
                .push_slice(&action.wire());
            builder = if i == last {
                // Final branch doubles as the invalid-code guard.
                builder.push_opcode(all::OP_EQUALVERIFY)
            } else {
                builder
                    .push_opcode(all::OP_EQUAL)
                    .push_opcode(all::OP_IF)
            };
            // Spender hash below, oracle hash on top: the tail consumes the
            // oracle commitment first.
            builder = builder
                .push_slice(&keys.key_hash(action.spender_role()).into_inner())
                .push_opcode(all::OP_TOALTSTACK)
                .push_slice(&keys.key_hash(action.oracle_role()).into_inner())
                .push_opcode(all::OP_TOALTSTACK);
            if i != last {
                builder = builder.push_opcode(all::OP_ELSE);
            }
        }
        for _ in 0..last {
            builder = builder.push_opcode(all::OP_ENDIF);
        }
        let script = builder
            // Rebuild the signed oracle message: action code then nonce.
            .push_slice(nonce.as_bytes())
            .push_opcode(all::OP_CAT)
            // The presented oracle public key must hash to the committed
            // key hash of the branch.
            .push_opcode(all::OP_OVER)
            .push_opcode(all::OP_HASH160)
            .push_opcode(all::OP_FROMALTSTACK)
            .push_opcode(all::OP_EQUALVERIFY)
            .push_opcode(all::OP_SWAP)
            .push_opcode(OP_CHECKDATASIGVERIFY)
            // Same commitment check for the spender key.
            .push_opcode(all::OP_DUP)
            .push_opcode(all::OP_HASH160)
            .push_opcode(all::OP_FROMALTSTACK)
            .push_opcode(all::OP_EQUALVERIFY)
            // The ledger does not validate a transaction signature the
            // script never checks, so the check is explicit.
            .push_opcode(all::OP_CHECKSIG)
            .into_script();
        EscrowScript { script }
    }

    /// The redeem script bytecode.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Raw bytes of the redeem script, as serialized into the final push of
    /// an unlocking script.
    pub fn as_bytes(&self) -> &[u8] {
        self.script.as_bytes()
    }

    /// hash160 of the bytecode; content-addresses the order.
    pub fn script_hash(&self) -> hash160::Hash {
        hash160::Hash::hash(self.script.as_bytes())
    }

    /// The pay-to-script-hash locking script funds are sent to.
    pub fn to_p2sh(&self) -> Script {
        self.script.to_p2sh()
    }

    /// Escrow deposit address for the given network.
    pub fn address(&self, network: Network) -> Address {
        Address {
            payload: Payload::ScriptHash(self.script.script_hash()),
            network,
        }
    }

    /// Hex artifact stored alongside the order.
    pub fn to_hex(&self) -> String {
        hex::encode(self.script.as_bytes())
    }

    /// Re-parse a stored hex artifact. The bytecode must scan as a script;
    /// whether it matches a given order is checked by comparing deposit
    /// addresses.
    pub fn from_hex(artifact: &str) -> Result<Self, Error> {
        let script = Script::from(hex::decode(artifact)?);
        if script.instructions().any(|instruction| instruction.is_err()) {
            return Err(Error::MalformedScript);
        }
        Ok(EscrowScript { script })
    }

    /// Iterate over the script instructions.
    pub fn instructions(
        &self,
    ) -> impl Iterator<Item = Result<Instruction<'_>, bitcoin::blockdata::script::Error>> {
        self.script.instructions()
    }
}

impl fmt::Display for EscrowScript {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for EscrowScript {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EscrowScript::from_hex(s)
    }
}

impl Serialize for EscrowScript {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EscrowScript {
    fn deserialize<D>(deserializer: D) -> Result<EscrowScript, D::Error>
    where
        D: Deserializer<'de>,
    {
        EscrowScript::from_hex(&String::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn keys() -> EscrowKeys {
        let secp = Secp256k1::new();
        let pk = |byte: u8| {
            let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
            PublicKey::from_secret_key(&secp, &sk)
        };
        EscrowKeys::new(pk(1), pk(2), pk(3), pk(4)).unwrap()
    }

    #[test]
    fn build_is_deterministic() {
        let nonce = Nonce::from_unix_millis(1624299825441);
        let a = EscrowScript::build(&keys(), &nonce);
        let b = EscrowScript::build(&keys(), &nonce);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.address(Network::Bitcoin), b.address(Network::Bitcoin));
    }

    #[test]
    fn nonce_changes_script_and_address() {
        let a = EscrowScript::build(&keys(), &Nonce::from_unix_millis(1));
        let b = EscrowScript::build(&keys(), &Nonce::from_unix_millis(2));
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.address(Network::Bitcoin), b.address(Network::Bitcoin));
    }

    #[test]
    fn hex_round_trip_preserves_bytecode() {
        let script = EscrowScript::build(&keys(), &Nonce::from_unix_millis(7));
        let restored = EscrowScript::from_hex(&script.to_hex()).unwrap();
        assert_eq!(script, restored);
        assert_eq!(script.script_hash(), restored.script_hash());
    }

    #[test]
    fn p2sh_wrapper_commits_to_redeem() {
        let script = EscrowScript::build(&keys(), &Nonce::from_unix_millis(7));
        assert!(script.to_p2sh().is_p2sh());
        assert_eq!(script.to_p2sh(), script.script().to_p2sh());
    }

    #[test]
    fn data_signature_opcodes_keep_their_bytes() {
        // The ledger assigns 0xba/0xbb to the data-signature checks; the
        // shared opcode table names those bytes differently.
        assert_eq!(OP_CHECKDATASIG.into_u8(), 0xba);
        assert_eq!(OP_CHECKDATASIGVERIFY.into_u8(), 0xbb);
    }

    #[test]
    fn reject_truncated_artifact() {
        let script = EscrowScript::build(&keys(), &Nonce::from_unix_millis(7));
        // Cut into the payload of the first key-hash push: the dangling
        // push prefix no longer scans as instructions. A truncation that
        // happens to end on an opcode boundary still scans; such an
        // artifact is only caught by the deposit-address comparison.
        let artifact = script.to_hex();
        assert!(EscrowScript::from_hex(&artifact[..16]).is_err());
        assert_eq!(
            EscrowScript::from_hex("zz"),
            Err(Error::ParseFailed(hex::FromHexError::InvalidHexCharacter {
                c: 'z',
                index: 0
            }))
        );
    }

    #[test]
    fn foreign_artifact_detected_by_deposit_address() {
        // Re-parsed bytecode that scans fine but belongs to another order
        // derives a different deposit address.
        let script = EscrowScript::build(&keys(), &Nonce::from_unix_millis(7));
        let other = EscrowScript::build(&keys(), &Nonce::from_unix_millis(8));
        let restored = EscrowScript::from_hex(&other.to_hex()).unwrap();
        assert_ne!(
            restored.address(Network::Bitcoin),
            script.address(Network::Bitcoin)
        );
    }

    #[test]
    fn six_branches_commit_all_roles() {
        let keys = keys();
        let nonce = Nonce::from_unix_millis(7);
        let script = EscrowScript::build(&keys, &nonce);
        let pushes: Vec<Vec<u8>> = script
            .instructions()
            .filter_map(|ins| match ins {
                Ok(Instruction::PushBytes(data)) => Some(data.to_vec()),
                _ => None,
            })
            .collect();
        for action in ActionCode::ALL.iter() {
            assert!(pushes.contains(&action.wire().to_vec()));
            let oracle = keys.key_hash(action.oracle_role()).into_inner().to_vec();
            let spender = keys.key_hash(action.spender_role()).into_inner().to_vec();
            assert!(pushes.contains(&oracle));
            assert!(pushes.contains(&spender));
        }
        assert!(pushes.contains(&nonce.as_bytes().to_vec()));
    }
}
