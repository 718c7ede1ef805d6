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

//! Roles distributed among the four participants of an order and the key
//! material each of them commits to the covenant. The seller and buyer are
//! the trading counterparties; the arbitrator and moderator are the
//! privileged third parties able to authorize a release or return when the
//! counterparties deadlock.

use std::fmt::Debug;
use std::str::FromStr;

use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::PublicKey;
use thiserror::Error;

/// Errors when assembling participant key material.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Two roles were given the same public key.
    #[error("Duplicate public key shared by roles {0} and {1}")]
    DuplicateKey(TradeRole, TradeRole),
    /// The given string does not name a trade role.
    #[error("Unknown trade role")]
    UnknownRole,
}

/// Possible roles during the life of an order. The seller funds the escrow,
/// the buyer receives a release, and the two privileged roles only ever sign
/// oracle authorizations.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum TradeRole {
    /// Funds the escrow and may return the funds to itself when authorized.
    Seller,
    /// Receives the escrowed funds on release.
    Buyer,
    /// Third party resolving an open dispute.
    Arbitrator,
    /// Third party breaking deadlocks before a dispute is opened.
    Moderator,
}

impl TradeRole {
    /// All four roles, in covenant commitment order.
    pub const ALL: [TradeRole; 4] = [
        TradeRole::Seller,
        TradeRole::Buyer,
        TradeRole::Arbitrator,
        TradeRole::Moderator,
    ];

    /// Return the trading counterparty, if the role has one.
    pub fn counterparty(&self) -> Option<Self> {
        match self {
            Self::Seller => Some(Self::Buyer),
            Self::Buyer => Some(Self::Seller),
            _ => None,
        }
    }
}

impl FromStr for TradeRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Seller" | "seller" => Ok(TradeRole::Seller),
            "Buyer" | "buyer" => Ok(TradeRole::Buyer),
            "Arbitrator" | "arbitrator" => Ok(TradeRole::Arbitrator),
            "Moderator" | "moderator" => Ok(TradeRole::Moderator),
            _ => Err(Error::UnknownRole),
        }
    }
}

/// A role bound to its public key. Immutable once the order is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Role held for the life of the order.
    pub role: TradeRole,
    /// Compressed secp256k1 public key committed to the covenant.
    pub public_key: PublicKey,
}

impl Participant {
    /// Bind a role to a public key.
    pub fn new(role: TradeRole, public_key: PublicKey) -> Self {
        Participant { role, public_key }
    }

    /// hash160 commitment to the public key, as embedded in the covenant.
    pub fn key_hash(&self) -> hash160::Hash {
        hash160::Hash::hash(&self.public_key.serialize())
    }
}

/// The four participants' keys of one order. Construction enforces pairwise
/// distinct public keys; a shared key would let one role impersonate another
/// inside the covenant branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowKeys {
    seller: PublicKey,
    buyer: PublicKey,
    arbitrator: PublicKey,
    moderator: PublicKey,
}

impl EscrowKeys {
    /// Assemble the four keys, rejecting any duplicate.
    pub fn new(
        seller: PublicKey,
        buyer: PublicKey,
        arbitrator: PublicKey,
        moderator: PublicKey,
    ) -> Result<Self, Error> {
        let keys = EscrowKeys {
            seller,
            buyer,
            arbitrator,
            moderator,
        };
        for (i, a) in TradeRole::ALL.iter().enumerate() {
            for b in TradeRole::ALL.iter().skip(i + 1) {
                if keys.key(*a) == keys.key(*b) {
                    return Err(Error::DuplicateKey(*a, *b));
                }
            }
        }
        Ok(keys)
    }

    /// Public key committed for the given role.
    pub fn key(&self, role: TradeRole) -> PublicKey {
        match role {
            TradeRole::Seller => self.seller,
            TradeRole::Buyer => self.buyer,
            TradeRole::Arbitrator => self.arbitrator,
            TradeRole::Moderator => self.moderator,
        }
    }

    /// Participant view for the given role.
    pub fn participant(&self, role: TradeRole) -> Participant {
        Participant::new(role, self.key(role))
    }

    /// hash160 commitment for the given role, as embedded in the covenant.
    pub fn key_hash(&self, role: TradeRole) -> hash160::Hash {
        self.participant(role).key_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};

    fn pk(byte: u8) -> PublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        PublicKey::from_secret_key(&secp, &sk)
    }

    #[test]
    fn parse_trade_role() {
        for s in ["Seller", "buyer", "Arbitrator", "moderator"].iter() {
            assert!(TradeRole::from_str(s).is_ok());
        }
        assert_eq!(TradeRole::from_str("oracle"), Err(Error::UnknownRole));
    }

    #[test]
    fn counterparties() {
        assert_eq!(
            TradeRole::Seller.counterparty(),
            Some(TradeRole::Buyer)
        );
        assert_eq!(TradeRole::Moderator.counterparty(), None);
    }

    #[test]
    fn distinct_keys_accepted() {
        assert!(EscrowKeys::new(pk(1), pk(2), pk(3), pk(4)).is_ok());
    }

    #[test]
    fn duplicate_keys_rejected() {
        let err = EscrowKeys::new(pk(1), pk(2), pk(1), pk(4)).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateKey(TradeRole::Seller, TradeRole::Arbitrator)
        );
    }

    #[test]
    fn key_hash_is_deterministic() {
        let keys = EscrowKeys::new(pk(1), pk(2), pk(3), pk(4)).unwrap();
        assert_eq!(
            keys.key_hash(TradeRole::Buyer),
            keys.key_hash(TradeRole::Buyer)
        );
        assert_ne!(
            keys.key_hash(TradeRole::Buyer),
            keys.key_hash(TradeRole::Seller)
        );
    }
}
