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

//! Tasks used by the orchestrator to instruct an indexer client what chain
//! state to track, and events returned to update the local order state.
//!
//! The core never talks to the network itself; it hands fully signed
//! transactions and watch requests to an implementation of [`Syncer`] and
//! records side effects through [`TradeStore`].

use std::error;
use std::fmt;

use bitcoin::{Address, Txid};
use thiserror::Error;

use crate::action::ActionCode;
use crate::role::TradeRole;
use crate::utxo::Utxo;

/// Errors reported by an indexer client. [`Self::Other`] can carry errors
/// from external sources.
#[derive(Error, Debug)]
pub enum Error {
    /// The node or indexer refused the raw transaction. Surfaces the
    /// backend's reason verbatim; the transaction itself was well-formed
    /// locally.
    #[error("Broadcast failed: {0}")]
    Broadcast(String),
    /// Any client error not part of this list.
    #[error("Syncer error: {0}")]
    Other(Box<dyn error::Error>),
}

impl Error {
    /// Creates a new error of type other with an arbitrary payload.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn error::Error>>,
    {
        Self::Other(error.into())
    }

    /// Consumes the `Error`, returning its inner error (if any).
    pub fn into_inner(self) -> Option<Box<dyn error::Error>> {
        match self {
            Self::Other(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Other(Box::new(err))
    }
}

/// Ask the client to report every transaction touching an address. Used on
/// the escrow deposit address to detect funding and settlement.
#[derive(Debug, Clone)]
pub struct WatchAddress {
    pub id: i32,
    pub address: Address,
}

impl fmt::Display for WatchAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "watch address id {}", self.id)
    }
}

/// Hand a raw signed transaction to the client for broadcast.
#[derive(Debug, Clone)]
pub struct BroadcastTransaction {
    pub id: i32,
    pub tx: Vec<u8>,
}

impl fmt::Display for BroadcastTransaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "broadcast transaction id {}", self.id)
    }
}

/// A transaction was seen on a watched address.
#[derive(Debug, Clone)]
pub struct AddressTransaction {
    pub id: i32,
    pub txid: Txid,
    pub amount: u64,
    pub tx: Vec<u8>,
}

impl fmt::Display for AddressTransaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "address transaction id {} txid {} amount {}",
            self.id, self.txid, self.amount
        )
    }
}

/// Chain access seam. Implementations receive tasks, query or contact the
/// backing node or indexer, and deliver [`AddressTransaction`] events back
/// to the orchestrator out of band.
pub trait Syncer {
    fn watch_address(&mut self, task: WatchAddress) -> Result<(), Error>;
    fn broadcast_transaction(&mut self, task: BroadcastTransaction) -> Result<(), Error>;
    fn fetch_utxos(&mut self, address: &Address) -> Result<Vec<Utxo>, Error>;
}

/// Terminal states a dispute record can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[display(Debug)]
pub enum DisputeStatus {
    /// Settled in favor of the buyer.
    ResolvedRelease,
    /// Settled in favor of the seller.
    ResolvedReturn,
}

impl From<ActionCode> for DisputeStatus {
    fn from(action: ActionCode) -> Self {
        if action.is_release() {
            DisputeStatus::ResolvedRelease
        } else {
            DisputeStatus::ResolvedReturn
        }
    }
}

/// Persistence seam for the bookkeeping a settlement produces: who signed
/// the spend, and how an open dispute was closed.
pub trait TradeStore {
    /// Record the signatory of a covenant spend on an order: which role
    /// acted, under which key hash.
    fn record_signatory(
        &mut self,
        order_id: &str,
        action: ActionCode,
        signatory: TradeRole,
        key_hash: &[u8],
    ) -> Result<(), Error>;

    /// Close a dispute record with its terminal status.
    fn record_dispute_resolution(
        &mut self,
        dispute_id: &str,
        status: DisputeStatus,
    ) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_action_direction() {
        assert_eq!(
            DisputeStatus::from(ActionCode::ArbiRelease),
            DisputeStatus::ResolvedRelease
        );
        assert_eq!(
            DisputeStatus::from(ActionCode::ModReturn),
            DisputeStatus::ResolvedReturn
        );
    }

    #[test]
    fn broadcast_error_carries_backend_reason() {
        let err = Error::Broadcast("missing inputs".into());
        assert_eq!(format!("{}", err), "Broadcast failed: missing inputs");
        assert!(err.into_inner().is_none());
    }

    #[test]
    fn other_error_round_trips_payload() {
        let err = Error::new(std::io::Error::new(std::io::ErrorKind::Other, "timeout"));
        assert!(err.into_inner().is_some());
    }
}
