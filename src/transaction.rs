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

//! Assembly of the spending transaction: inputs bound to their unlocking
//! factories, outputs in the protocol's fixed order, every input signed
//! independently, and the result serialized for broadcast.
//!
//! Output order is an explicit contract, not an accident: the primary
//! transfer output always comes first and the fee/change output second.
//! The dispute-fee collection flow reads the fee output positionally.

use bitcoin::blockdata::script::Script;
use bitcoin::blockdata::transaction::{Transaction, TxIn, TxOut};
use bitcoin::consensus::encode::{serialize, serialize_hex};
use bitcoin::{Amount, Txid};
use thiserror::Error;

use crate::fee::{self, SatPerKvB};
use crate::unlock::{self, CovenantUnlocker, KeyUnlocker, Unlocker};
use crate::sighash::TxInRef;
use crate::utxo::{self, CoinSelection, Utxo};

/// Errors when assembling a transaction.
#[derive(Error, Debug)]
pub enum Error {
    /// The escrowed value does not cover the outputs and the mining fee.
    #[error("Not enough assets to create the transaction")]
    NotEnoughAssets,
    /// Unlocking script production failed.
    #[error("Unlock error: {0}")]
    Unlock(#[from] unlock::Error),
    /// Coin selection or splitting failed.
    #[error("Utxo error: {0}")]
    Utxo(#[from] utxo::Error),
}

/// A fully signed transaction, ready for broadcast by the orchestrator via
/// the external indexer client. The core never broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: Transaction,
}

impl SignedTransaction {
    /// Transaction id of the signed transaction.
    pub fn txid(&self) -> Txid {
        self.tx.txid()
    }

    /// Borrow the underlying transaction.
    pub fn as_transaction(&self) -> &Transaction {
        &self.tx
    }

    /// Extract the underlying transaction.
    pub fn into_transaction(self) -> Transaction {
        self.tx
    }

    /// Consensus serialization, the exact bytes handed to `broadcast`.
    pub fn serialize(&self) -> Vec<u8> {
        serialize(&self.tx)
    }

    /// Hex form of [`Self::serialize`].
    pub fn to_hex(&self) -> String {
        serialize_hex(&self.tx)
    }
}

/// Build the unsigned skeleton, then sign every input with its assigned
/// unlocking factory. Outputs are emitted in the order given.
pub fn assemble(
    inputs: &[(Utxo, &dyn Unlocker)],
    outputs: Vec<TxOut>,
) -> Result<SignedTransaction, Error> {
    let mut tx = Transaction {
        version: 2,
        lock_time: 0,
        input: inputs
            .iter()
            .map(|(utxo, _)| TxIn {
                previous_output: utxo.outpoint,
                script_sig: Script::new(),
                sequence: 0xFFFFFFFF,
                witness: Default::default(),
            })
            .collect(),
        output: outputs,
    };

    // Sign against the unsigned skeleton: the sighash preimage never covers
    // other inputs' unlocking scripts.
    let mut scripts = Vec::with_capacity(inputs.len());
    for (index, (utxo, unlocker)) in inputs.iter().enumerate() {
        scripts.push(unlocker.unlocking_script(TxInRef::new(&tx, index), utxo.value.as_sat())?);
    }
    for (txin, script) in tx.input.iter_mut().zip(scripts) {
        txin.script_sig = script;
    }

    Ok(SignedTransaction { tx })
}

/// Build a covenant spend of the escrow UTXO. The transfer to the
/// recipient is output 0 and the dispute fee to the collector is output 1;
/// the mining fee is estimated from the redeem script size and deducted
/// from the transfer.
pub fn build_release(
    escrow_utxo: &Utxo,
    unlocker: &CovenantUnlocker,
    recipient: Script,
    fee_collector: Script,
    dispute_fee: Amount,
    fee_rate: SatPerKvB,
) -> Result<SignedTransaction, Error> {
    let size = fee::estimated_spend_size(1, 2, unlocker.escrow_script().as_bytes().len());
    let mining_fee = fee::mining_fee(fee_rate, size);
    let transfer = escrow_utxo
        .value
        .checked_sub(dispute_fee)
        .and_then(|amount| amount.checked_sub(mining_fee))
        .ok_or(Error::NotEnoughAssets)?;
    let outputs = vec![
        TxOut {
            value: transfer.as_sat(),
            script_pubkey: recipient,
        },
        TxOut {
            value: dispute_fee.as_sat(),
            script_pubkey: fee_collector,
        },
    ];
    assemble(&[(escrow_utxo.clone(), unlocker)], outputs)
}

/// Build a wallet split pre-funding a security deposit: one output of
/// exactly `target` satoshis to `deposit`, change back to `change` when
/// worth creating. All selected coins must be spendable by `unlocker`.
pub fn build_split(
    selection: &CoinSelection,
    unlocker: &KeyUnlocker,
    deposit: Script,
    change: Script,
    target: Amount,
    fee_rate: SatPerKvB,
) -> Result<SignedTransaction, Error> {
    let size = fee::estimated_wallet_size(selection.coins.len(), 2);
    let mining_fee = fee::mining_fee(fee_rate, size);
    let plan = utxo::plan_split(selection.total, target, mining_fee)?;

    let mut outputs = vec![TxOut {
        value: plan.target.as_sat(),
        script_pubkey: deposit,
    }];
    if let Some(value) = plan.change {
        outputs.push(TxOut {
            value: value.as_sat(),
            script_pubkey: change,
        });
    }

    let inputs: Vec<(Utxo, &dyn Unlocker)> = selection
        .coins
        .iter()
        .map(|coin| (coin.clone(), unlocker as &dyn Unlocker))
        .collect();
    assemble(&inputs, outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::blockdata::transaction::OutPoint;
    use bitcoin::consensus::encode::deserialize;
    use bitcoin::secp256k1::SecretKey;

    fn wallet_utxo(unlocker: &KeyUnlocker, vout: u32, value: u64) -> Utxo {
        Utxo {
            outpoint: OutPoint {
                txid: Default::default(),
                vout,
            },
            value: Amount::from_sat(value),
            script_pubkey: unlocker.locking_script(),
        }
    }

    #[test]
    fn serialization_round_trip() {
        let unlocker = KeyUnlocker::new(SecretKey::from_slice(&[5; 32]).unwrap());
        let utxo = wallet_utxo(&unlocker, 0, 100_000);
        let signed = assemble(
            &[(utxo, &unlocker)],
            vec![TxOut {
                value: 99_000,
                script_pubkey: unlocker.locking_script(),
            }],
        )
        .unwrap();
        let bytes = signed.serialize();
        let restored: Transaction = deserialize(&bytes).unwrap();
        assert_eq!(restored.txid(), signed.txid());
        assert_eq!(hex::encode(&bytes), signed.to_hex());
    }

    #[test]
    fn every_input_gets_its_own_script() {
        let unlocker = KeyUnlocker::new(SecretKey::from_slice(&[5; 32]).unwrap());
        let coins = vec![
            wallet_utxo(&unlocker, 0, 40_000),
            wallet_utxo(&unlocker, 1, 30_000),
        ];
        let signed = assemble(
            &[(coins[0].clone(), &unlocker), (coins[1].clone(), &unlocker)],
            vec![TxOut {
                value: 69_000,
                script_pubkey: unlocker.locking_script(),
            }],
        )
        .unwrap();
        let tx = signed.as_transaction();
        assert!(tx.input.iter().all(|txin| !txin.script_sig.is_empty()));
        // Signatures commit to the outpoint, so the two scripts differ.
        assert_ne!(tx.input[0].script_sig, tx.input[1].script_sig);
    }

    #[test]
    fn split_outputs_are_target_then_change() {
        let unlocker = KeyUnlocker::new(SecretKey::from_slice(&[5; 32]).unwrap());
        let coins = vec![
            wallet_utxo(&unlocker, 0, 30_000),
            wallet_utxo(&unlocker, 1, 40_000),
        ];
        let selection = utxo::select_coins(&coins, Amount::from_sat(60_000)).unwrap();
        let signed = build_split(
            &selection,
            &unlocker,
            unlocker.locking_script(),
            unlocker.locking_script(),
            Amount::from_sat(60_000),
            SatPerKvB::from_sat(0),
        )
        .unwrap();
        let tx = signed.as_transaction();
        assert_eq!(tx.output.len(), 2);
        assert_eq!(tx.output[0].value, 60_000);
        assert_eq!(tx.output[1].value, 10_000);
    }

    #[test]
    fn split_change_shrinks_by_fee() {
        let unlocker = KeyUnlocker::new(SecretKey::from_slice(&[5; 32]).unwrap());
        let coins = vec![
            wallet_utxo(&unlocker, 0, 30_000),
            wallet_utxo(&unlocker, 1, 40_000),
        ];
        let selection = utxo::select_coins(&coins, Amount::from_sat(60_000)).unwrap();
        let rate = SatPerKvB::from_sat(1_000);
        let expected_fee = fee::mining_fee(rate, fee::estimated_wallet_size(2, 2));
        let signed = build_split(
            &selection,
            &unlocker,
            unlocker.locking_script(),
            unlocker.locking_script(),
            Amount::from_sat(60_000),
            rate,
        )
        .unwrap();
        let tx = signed.as_transaction();
        assert_eq!(tx.output[1].value, 10_000 - expected_fee.as_sat());
    }
}
