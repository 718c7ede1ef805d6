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

//! Unlocking-script factories: one generic covenant builder parameterized
//! by the action code, and a plain key builder for wallet inputs.
//!
//! A factory receives the fully-formed unsigned transaction through a
//! [`TxInRef`], signs the input's sighash preimage with the spender key,
//! and emits the six-element unlocking script: spender signature, spender
//! public key, oracle signature, oracle public key, action wire bytes, and
//! the serialized redeem script.

use bitcoin::blockdata::script::{Builder, Script};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use crate::action::ActionCode;
use crate::oracle::{self, Nonce, OracleSignature};
use crate::script::EscrowScript;
use crate::sighash::{signature_hash, TxInRef, SIGHASH_ALL_FORKID};

/// Errors when producing an unlocking script.
#[derive(Error, Debug)]
pub enum Error {
    /// Secp256k1 error.
    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
    /// The oracle material does not authorize this factory's action code.
    #[error("Oracle signature does not match action {0}")]
    AuthorizationMismatch(ActionCode),
}

/// Seam between the transaction assembler and the per-input signing logic.
/// Implementations must be pure: same transaction, same script.
pub trait Unlocker {
    /// Build the unlocking script for the referenced input, spending an
    /// output of `value` satoshis.
    fn unlocking_script(&self, txin: TxInRef, value: u64) -> Result<Script, Error>;
}

/// Factory for one covenant path. The six per-path builders collapse into
/// this single type; only the action code and the key material differ.
#[derive(Debug, Clone)]
pub struct CovenantUnlocker {
    action: ActionCode,
    escrow: EscrowScript,
    spender_key: SecretKey,
    spender_pubkey: PublicKey,
    oracle_pubkey: PublicKey,
    oracle_signature: OracleSignature,
}

impl CovenantUnlocker {
    /// Assemble the factory for one spend attempt. The oracle signature and
    /// public key must correspond to `action`; a mismatch is only rejected
    /// by the covenant at spend time, or earlier via [`Self::verify_authorization`].
    pub fn new(
        action: ActionCode,
        escrow: EscrowScript,
        spender_key: SecretKey,
        oracle_pubkey: PublicKey,
        oracle_signature: OracleSignature,
    ) -> Self {
        let secp = Secp256k1::new();
        let spender_pubkey = PublicKey::from_secret_key(&secp, &spender_key);
        CovenantUnlocker {
            action,
            escrow,
            spender_key,
            spender_pubkey,
            oracle_pubkey,
            oracle_signature,
        }
    }

    /// The path this factory spends.
    pub fn action(&self) -> ActionCode {
        self.action
    }

    /// The redeem script serialized into the final stack push.
    pub fn escrow_script(&self) -> &EscrowScript {
        &self.escrow
    }

    /// hash160 of the spender public key, recorded with the signatory.
    pub fn spender_key_hash(&self) -> hash160::Hash {
        hash160::Hash::hash(&self.spender_pubkey.serialize())
    }

    /// Local preflight of the invariant the covenant enforces on-chain:
    /// the oracle material must authorize exactly this action code under
    /// this order's nonce.
    pub fn verify_authorization(&self, nonce: &Nonce) -> Result<(), Error> {
        let secp = Secp256k1::verification_only();
        if oracle::verify_action(
            &secp,
            &self.oracle_signature,
            self.action,
            nonce,
            &self.oracle_pubkey,
        ) {
            Ok(())
        } else {
            Err(Error::AuthorizationMismatch(self.action))
        }
    }
}

impl Unlocker for CovenantUnlocker {
    fn unlocking_script(&self, txin: TxInRef, value: u64) -> Result<Script, Error> {
        let sighash = signature_hash(txin, self.escrow.script(), value, SIGHASH_ALL_FORKID);
        let message = Message::from_slice(&sighash.into_inner())?;
        let secp = Secp256k1::signing_only();
        let signature = secp.sign_ecdsa(&message, &self.spender_key);
        let mut spender_sig = signature.serialize_der().to_vec();
        spender_sig.push(SIGHASH_ALL_FORKID as u8);
        Ok(Builder::new()
            .push_slice(&spender_sig)
            .push_slice(&self.spender_pubkey.serialize())
            .push_slice(&self.oracle_signature.to_der())
            .push_slice(&self.oracle_pubkey.serialize())
            .push_slice(&self.action.wire())
            .push_slice(self.escrow.as_bytes())
            .into_script())
    }
}

/// Factory for plain pay-to-pubkey-hash wallet inputs, used when splitting
/// coins to pre-fund a security deposit.
#[derive(Debug, Clone)]
pub struct KeyUnlocker {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyUnlocker {
    /// Factory signing with the given wallet key.
    pub fn new(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        KeyUnlocker {
            secret_key,
            public_key,
        }
    }

    /// The wallet public key.
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// The locking script this factory can spend.
    pub fn locking_script(&self) -> Script {
        let key = bitcoin::util::key::PublicKey::new(self.public_key);
        Script::new_p2pkh(&key.pubkey_hash())
    }
}

impl Unlocker for KeyUnlocker {
    fn unlocking_script(&self, txin: TxInRef, value: u64) -> Result<Script, Error> {
        let script_code = self.locking_script();
        let sighash = signature_hash(txin, &script_code, value, SIGHASH_ALL_FORKID);
        let message = Message::from_slice(&sighash.into_inner())?;
        let secp = Secp256k1::signing_only();
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        let mut sig = signature.serialize_der().to_vec();
        sig.push(SIGHASH_ALL_FORKID as u8);
        Ok(Builder::new()
            .push_slice(&sig)
            .push_slice(&self.public_key.serialize())
            .into_script())
    }
}
