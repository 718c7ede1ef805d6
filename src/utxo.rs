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

//! Unspent outputs, greedy coin selection, and the exact-value split plan
//! used when a security deposit must be pre-funded.

use bitcoin::blockdata::script::Script;
use bitcoin::blockdata::transaction::{OutPoint, TxOut};
use bitcoin::Amount;
use thiserror::Error;

use crate::fee::DUST_LIMIT;

/// Errors when selecting or splitting coins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The available coins do not reach the target value. Reported locally
    /// before any transaction is built; a spend is never silently
    /// under-funded.
    #[error("Insufficient funds: need {needed} satoshis, have {available}")]
    InsufficientFunds {
        /// Satoshis required to proceed.
        needed: u64,
        /// Satoshis actually available.
        available: u64,
    },
}

/// An unspent transaction output, consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Transaction id and output index.
    pub outpoint: OutPoint,
    /// Value of the output in satoshis.
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub value: Amount,
    /// Locking script of the output.
    pub script_pubkey: Script,
}

impl Utxo {
    /// View as the transaction output it refers to, as needed when
    /// re-checking a spend against it.
    pub fn to_txout(&self) -> TxOut {
        TxOut {
            value: self.value.as_sat(),
            script_pubkey: self.script_pubkey.clone(),
        }
    }
}

/// Result of a successful coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected coins, in input order.
    pub coins: Vec<Utxo>,
    /// Sum of the selected values.
    pub total: Amount,
}

/// Greedily accumulate coins, in iteration order, until the running total
/// reaches `target`.
pub fn select_coins(available: &[Utxo], target: Amount) -> Result<CoinSelection, Error> {
    let mut coins = Vec::new();
    let mut total = Amount::from_sat(0);
    for utxo in available {
        if total >= target {
            break;
        }
        total += utxo.value;
        coins.push(utxo.clone());
    }
    if total < target {
        return Err(Error::InsufficientFunds {
            needed: target.as_sat(),
            available: total.as_sat(),
        });
    }
    Ok(CoinSelection { coins, total })
}

/// Output values of a split transaction: one output of exactly the target
/// value, plus change back to the payer when it is worth creating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    /// The exact-value deposit output.
    pub target: Amount,
    /// Change output, absent when zero or below the dust floor (sub-dust
    /// change folds into the fee).
    pub change: Option<Amount>,
}

/// Compute the split outputs for `total` selected satoshis, an exact
/// `target` deposit, and a `fee` already determined from the transaction
/// size.
pub fn plan_split(total: Amount, target: Amount, fee: Amount) -> Result<SplitPlan, Error> {
    let needed = target
        .checked_add(fee)
        .map(|amount| amount.as_sat())
        .unwrap_or(u64::MAX);
    let change = total
        .as_sat()
        .checked_sub(needed)
        .ok_or(Error::InsufficientFunds {
            needed,
            available: total.as_sat(),
        })?;
    Ok(SplitPlan {
        target,
        change: if change >= DUST_LIMIT {
            Some(Amount::from_sat(change))
        } else {
            None
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(vout: u32, value: u64) -> Utxo {
        Utxo {
            outpoint: OutPoint {
                txid: Default::default(),
                vout,
            },
            value: Amount::from_sat(value),
            script_pubkey: Script::new(),
        }
    }

    #[test]
    fn first_combination_reaching_target_wins() {
        // Coins [3, 4, 10] in hundred-satoshi units with target 6: the
        // greedy pass stops at {3, 4}.
        let coins = vec![utxo(0, 30_000), utxo(1, 40_000), utxo(2, 100_000)];
        let selection = select_coins(&coins, Amount::from_sat(60_000)).unwrap();
        assert_eq!(selection.coins, vec![utxo(0, 30_000), utxo(1, 40_000)]);
        assert_eq!(selection.total.as_sat(), 70_000);
    }

    #[test]
    fn exact_total_selects_everything_needed() {
        let coins = vec![utxo(0, 500), utxo(1, 500)];
        let selection = select_coins(&coins, Amount::from_sat(1_000)).unwrap();
        assert_eq!(selection.coins.len(), 2);
    }

    #[test]
    fn shortfall_is_reported_not_underfunded() {
        let coins = vec![utxo(0, 30_000), utxo(1, 20_000)];
        let err = select_coins(&coins, Amount::from_sat(60_000)).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientFunds {
                needed: 60_000,
                available: 50_000,
            }
        );
    }

    #[test]
    fn split_emits_exact_target_plus_change() {
        let plan = plan_split(
            Amount::from_sat(70_000),
            Amount::from_sat(60_000),
            Amount::from_sat(0),
        )
        .unwrap();
        assert_eq!(plan.target.as_sat(), 60_000);
        assert_eq!(plan.change, Some(Amount::from_sat(10_000)));
    }

    #[test]
    fn fee_is_taken_from_change() {
        let plan = plan_split(
            Amount::from_sat(70_000),
            Amount::from_sat(60_000),
            Amount::from_sat(1_000),
        )
        .unwrap();
        assert_eq!(plan.change, Some(Amount::from_sat(9_000)));
    }

    #[test]
    fn sub_dust_change_folds_into_fee() {
        let plan = plan_split(
            Amount::from_sat(60_500),
            Amount::from_sat(60_000),
            Amount::from_sat(100),
        )
        .unwrap();
        assert_eq!(plan.change, None);
    }

    #[test]
    fn split_shortfall_rejected() {
        let err = plan_split(
            Amount::from_sat(60_000),
            Amount::from_sat(60_000),
            Amount::from_sat(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientFunds {
                needed: 60_001,
                available: 60_000,
            }
        );
    }
}
