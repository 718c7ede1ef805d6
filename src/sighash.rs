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

//! Transaction-level signature scheme for covenant spends.
//!
//! The ledger uses a replay-protected BIP143-style preimage: the spender
//! commits to the exact transaction consuming the escrow UTXO, with the
//! redeem script as scriptCode and the input value included. This is the
//! second of the protocol's two signature schemes and must not be unified
//! with the oracle's data signature in [`crate::oracle`].

use bitcoin::blockdata::script::Script;
use bitcoin::blockdata::transaction::Transaction;
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::{sha256d, Hash};

/// The only sighash type covenant spends use: commit to all inputs and all
/// outputs, with the fork-id replay-protection bit set.
pub const SIGHASH_ALL_FORKID: u32 = 0x41;

/// A borrowed reference to a transaction input.
#[derive(Debug, Copy, Clone)]
pub struct TxInRef<'a> {
    pub(crate) transaction: &'a Transaction,
    pub(crate) index: usize,
}

impl<'a> TxInRef<'a> {
    /// Constructs a reference to the input with the given index of the
    /// given transaction.
    pub fn new(transaction: &'a Transaction, index: usize) -> TxInRef<'a> {
        assert!(transaction.input.len() > index);
        TxInRef { transaction, index }
    }

    /// Returns the transaction the input belongs to.
    pub fn transaction(&self) -> &Transaction {
        self.transaction
    }

    /// Returns the index of the input.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Computes the signature digest for the input referenced by `txin`, with
/// `script_code` the locking context of the spent output (the redeem script
/// for covenant inputs, the previous locking script for plain key inputs)
/// and `value` the spent output's value in satoshis.
///
/// Preimage layout: version, hashPrevouts, hashSequence, outpoint,
/// scriptCode (varint-prefixed), value, sequence, hashOutputs, locktime,
/// 4-byte LE sighash type. The digest is a double SHA-256.
pub fn signature_hash(
    txin: TxInRef,
    script_code: &Script,
    value: u64,
    sighash_type: u32,
) -> sha256d::Hash {
    let tx = txin.transaction;
    let input = &tx.input[txin.index];

    let mut prevouts = Vec::new();
    let mut sequences = Vec::new();
    for txin in &tx.input {
        prevouts.extend(serialize(&txin.previous_output));
        sequences.extend(serialize(&txin.sequence));
    }
    let hash_prevouts = sha256d::Hash::hash(&prevouts);
    let hash_sequence = sha256d::Hash::hash(&sequences);

    let mut outputs = Vec::new();
    for txout in &tx.output {
        outputs.extend(serialize(txout));
    }
    let hash_outputs = sha256d::Hash::hash(&outputs);

    let mut preimage = Vec::new();
    preimage.extend(serialize(&tx.version));
    preimage.extend(hash_prevouts.into_inner());
    preimage.extend(hash_sequence.into_inner());
    preimage.extend(serialize(&input.previous_output));
    preimage.extend(serialize(script_code));
    preimage.extend(serialize(&value));
    preimage.extend(serialize(&input.sequence));
    preimage.extend(hash_outputs.into_inner());
    preimage.extend(serialize(&tx.lock_time));
    preimage.extend(serialize(&sighash_type));

    sha256d::Hash::hash(&preimage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::blockdata::transaction::{OutPoint, TxIn, TxOut};

    fn sample_tx(outputs: Vec<TxOut>) -> Transaction {
        Transaction {
            version: 2,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint::default(),
                script_sig: Script::new(),
                sequence: 0xFFFFFFFF,
                witness: Default::default(),
            }],
            output: outputs,
        }
    }

    #[test]
    fn digest_commits_to_outputs() {
        let script = Script::new();
        let a = sample_tx(vec![TxOut {
            value: 1_000,
            script_pubkey: Script::new(),
        }]);
        let b = sample_tx(vec![TxOut {
            value: 2_000,
            script_pubkey: Script::new(),
        }]);
        let ha = signature_hash(TxInRef::new(&a, 0), &script, 5_000, SIGHASH_ALL_FORKID);
        let hb = signature_hash(TxInRef::new(&b, 0), &script, 5_000, SIGHASH_ALL_FORKID);
        assert_ne!(ha, hb);
    }

    #[test]
    fn digest_commits_to_value_and_script_code() {
        let tx = sample_tx(vec![TxOut {
            value: 1_000,
            script_pubkey: Script::new(),
        }]);
        let code_a = Script::new();
        let code_b = Script::from(vec![0x51]);
        let base = signature_hash(TxInRef::new(&tx, 0), &code_a, 5_000, SIGHASH_ALL_FORKID);
        assert_ne!(
            base,
            signature_hash(TxInRef::new(&tx, 0), &code_a, 6_000, SIGHASH_ALL_FORKID)
        );
        assert_ne!(
            base,
            signature_hash(TxInRef::new(&tx, 0), &code_b, 5_000, SIGHASH_ALL_FORKID)
        );
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_input_panics() {
        let tx = sample_tx(vec![]);
        let _ = TxInRef::new(&tx, 1);
    }
}
