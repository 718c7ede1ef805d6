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

//! Order lifecycle: one escrowed trade from creation to resolution.
//!
//! The covenant is built once at creation and never changes; the order
//! record tracks the funded escrow around it. State moves strictly forward,
//! and a resolved order keeps the action code and transaction id of the
//! spend that settled it.

use bitcoin::{Amount, Network, Txid};
use thiserror::Error;

use crate::action::ActionCode;
use crate::fee;
use crate::oracle::Nonce;
use crate::role::EscrowKeys;
use crate::script::EscrowScript;

/// Errors when driving the order state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The requested transition is not allowed from the current state.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// State the order is in.
        from: OrderState,
        /// State the transition would have produced.
        to: OrderState,
    },
    /// A resolved order cannot be settled a second time.
    #[error("Order already resolved by action {0}")]
    AlreadyResolved(ActionCode),
}

/// Lifecycle states of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display(Debug)]
pub enum OrderState {
    /// Created, not yet accepted by the buyer.
    Pending,
    /// Accepted; waiting for the escrow deposit.
    Active,
    /// The escrow UTXO is confirmed on the deposit address.
    Escrowed,
    /// A dispute was opened; only arbitrator or moderator paths settle it.
    Disputed,
    /// Settled by a release path.
    Completed,
    /// Settled by a return path, or abandoned before funding.
    Cancelled,
}

/// The spend that settled an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The covenant path that was taken.
    pub action: ActionCode,
    /// Transaction id of the settling spend.
    pub txid: Txid,
}

/// One escrowed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Escrowed amount.
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
    /// Per-order nonce embedded in the covenant.
    pub nonce: Nonce,
    /// The covenant locking script of this order.
    pub escrow: EscrowScript,
    /// Dispute/security fee charged on `amount`, fixed at creation.
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub security_fee: Amount,
    /// Funding transaction of the buyer's security deposit, once seen.
    pub buyer_deposit: Option<Txid>,
    /// Set once, when the order settles.
    pub resolution: Option<Resolution>,
    /// Current lifecycle state.
    pub state: OrderState,
}

impl Order {
    /// Create an order: builds the covenant from the four keys and the
    /// nonce and fixes the security fee from the amount.
    pub fn new(keys: &EscrowKeys, amount: Amount, nonce: Nonce) -> Self {
        let escrow = EscrowScript::build(keys, &nonce);
        let security_fee = fee::dispute_fee(amount);
        Order {
            amount,
            nonce,
            escrow,
            security_fee,
            buyer_deposit: None,
            resolution: None,
            state: OrderState::Pending,
        }
    }

    /// Escrow deposit address of this order.
    pub fn deposit_address(&self, network: Network) -> bitcoin::Address {
        self.escrow.address(network)
    }

    fn transition(&mut self, from: &[OrderState], to: OrderState) -> Result<(), Error> {
        if !from.contains(&self.state) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// The buyer accepted the order.
    pub fn activate(&mut self) -> Result<(), Error> {
        self.transition(&[OrderState::Pending], OrderState::Active)
    }

    /// The escrow deposit confirmed on the covenant address.
    pub fn escrow_funded(&mut self) -> Result<(), Error> {
        self.transition(&[OrderState::Active], OrderState::Escrowed)
    }

    /// A party opened a dispute on the funded escrow.
    pub fn open_dispute(&mut self) -> Result<(), Error> {
        self.transition(&[OrderState::Escrowed], OrderState::Disputed)
    }

    /// The buyer's security deposit was funded. Does not change state; the
    /// deposit is tracked independently of the escrow.
    pub fn record_buyer_deposit(&mut self, txid: Txid) {
        self.buyer_deposit = Some(txid);
    }

    /// Settle the order with the spend that took `action`. Release paths
    /// complete the order, return paths cancel it.
    pub fn resolve(&mut self, action: ActionCode, txid: Txid) -> Result<(), Error> {
        if let Some(resolution) = &self.resolution {
            return Err(Error::AlreadyResolved(resolution.action));
        }
        let to = if action.is_release() {
            OrderState::Completed
        } else {
            OrderState::Cancelled
        };
        self.transition(&[OrderState::Escrowed, OrderState::Disputed], to)?;
        self.resolution = Some(Resolution { action, txid });
        Ok(())
    }

    /// Abandon an unfunded order. Funded escrows can only be settled
    /// through a covenant path.
    pub fn cancel(&mut self) -> Result<(), Error> {
        self.transition(
            &[OrderState::Pending, OrderState::Active],
            OrderState::Cancelled,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn order() -> Order {
        let secp = Secp256k1::new();
        let pk = |byte: u8| {
            let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
            PublicKey::from_secret_key(&secp, &sk)
        };
        let keys = EscrowKeys::new(pk(1), pk(2), pk(3), pk(4)).unwrap();
        Order::new(&keys, Amount::from_sat(60_000), Nonce::from_unix_millis(1))
    }

    #[test]
    fn creation_fixes_fee_and_covenant() {
        let order = order();
        assert_eq!(order.state, OrderState::Pending);
        assert_eq!(order.security_fee.as_sat(), 600);
        assert_eq!(
            order.escrow.to_p2sh(),
            order.deposit_address(Network::Bitcoin).script_pubkey()
        );
    }

    #[test]
    fn happy_path_release_completes() {
        let mut order = order();
        order.activate().unwrap();
        order.escrow_funded().unwrap();
        order
            .resolve(ActionCode::SellerRelease, Txid::default())
            .unwrap();
        assert_eq!(order.state, OrderState::Completed);
        assert_eq!(
            order.resolution.unwrap().action,
            ActionCode::SellerRelease
        );
    }

    #[test]
    fn disputed_return_cancels() {
        let mut order = order();
        order.activate().unwrap();
        order.escrow_funded().unwrap();
        order.open_dispute().unwrap();
        order
            .resolve(ActionCode::ArbiReturn, Txid::default())
            .unwrap();
        assert_eq!(order.state, OrderState::Cancelled);
    }

    #[test]
    fn resolution_is_final() {
        let mut order = order();
        order.activate().unwrap();
        order.escrow_funded().unwrap();
        order
            .resolve(ActionCode::ModRelease, Txid::default())
            .unwrap();
        assert_eq!(
            order.resolve(ActionCode::ModReturn, Txid::default()),
            Err(Error::AlreadyResolved(ActionCode::ModRelease))
        );
    }

    #[test]
    fn unfunded_order_cannot_settle() {
        let mut order = order();
        assert_eq!(
            order.resolve(ActionCode::SellerRelease, Txid::default()),
            Err(Error::InvalidTransition {
                from: OrderState::Pending,
                to: OrderState::Completed,
            })
        );
    }

    #[test]
    fn funded_escrow_cannot_be_abandoned() {
        let mut order = order();
        order.activate().unwrap();
        order.escrow_funded().unwrap();
        assert_eq!(
            order.cancel(),
            Err(Error::InvalidTransition {
                from: OrderState::Escrowed,
                to: OrderState::Cancelled,
            })
        );
    }

    #[test]
    fn deposit_tracked_without_state_change() {
        let mut order = order();
        order.activate().unwrap();
        order.record_buyer_deposit(Txid::default());
        assert_eq!(order.state, OrderState::Active);
        assert!(order.buyer_deposit.is_some());
    }
}
