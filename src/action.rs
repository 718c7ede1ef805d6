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

//! Action codes naming the six directed transfers a covenant can authorize.
//! Each code binds one oracle role (who signs the authorization) to one
//! spender role (who signs and broadcasts the spending transaction); the
//! spender is always the recipient of the funds. Codes are mutually
//! exclusive and never composable.
//!
//! The table below is the single source of truth; the script builder and
//! the unlocking factories both derive their branches from it.
//!
//! | Code | Action        | Oracle     | Spender |
//! |------|---------------|------------|---------|
//! | 01   | SellerRelease | Seller     | Buyer   |
//! | 02   | ArbiRelease   | Arbitrator | Buyer   |
//! | 03   | BuyerReturn   | Buyer      | Seller  |
//! | 04   | ArbiReturn    | Arbitrator | Seller  |
//! | 05   | ModRelease    | Moderator  | Buyer   |
//! | 06   | ModReturn     | Moderator  | Seller  |

use std::str::FromStr;

use thiserror::Error;

use crate::role::TradeRole;

/// Errors when decoding an action code from its wire form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The bytes are not one of the six two-digit codes.
    #[error("Unknown action code")]
    UnknownCode,
}

/// One of the six directed transfers. The numeric value exists only in this
/// enum; on the wire and on the unlocking stack the code is the two-ASCII-
/// digit string returned by [`ActionCode::wire`].
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum ActionCode {
    /// Seller authorizes the buyer to take the funds.
    SellerRelease,
    /// Arbitrator resolves a dispute in favor of the buyer.
    ArbiRelease,
    /// Buyer authorizes the seller to take the funds back.
    BuyerReturn,
    /// Arbitrator resolves a dispute in favor of the seller.
    ArbiReturn,
    /// Moderator breaks a deadlock in favor of the buyer.
    ModRelease,
    /// Moderator breaks a deadlock in favor of the seller.
    ModReturn,
}

impl ActionCode {
    /// All six codes, in branch order of the covenant script.
    pub const ALL: [ActionCode; 6] = [
        ActionCode::SellerRelease,
        ActionCode::ArbiRelease,
        ActionCode::BuyerReturn,
        ActionCode::ArbiReturn,
        ActionCode::ModRelease,
        ActionCode::ModReturn,
    ];

    /// Numeric code in `1..=6`.
    pub fn code(self) -> u8 {
        match self {
            ActionCode::SellerRelease => 1,
            ActionCode::ArbiRelease => 2,
            ActionCode::BuyerReturn => 3,
            ActionCode::ArbiReturn => 4,
            ActionCode::ModRelease => 5,
            ActionCode::ModReturn => 6,
        }
    }

    /// Two-ASCII-digit zero-padded wire value (`b"01"`..`b"06"`). This exact
    /// byte string sits on the unlocking stack and is concatenated, without
    /// a length prefix, with the order nonce inside the oracle message.
    pub fn wire(self) -> [u8; 2] {
        [b'0', b'0' + self.code()]
    }

    /// Decode a wire value back into a code.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        Self::ALL
            .iter()
            .find(|action| action.wire() == bytes)
            .copied()
            .ok_or(Error::UnknownCode)
    }

    /// Role whose data signature authorizes this transfer.
    pub fn oracle_role(self) -> TradeRole {
        self.roles().0
    }

    /// Role that signs and broadcasts the spending transaction.
    pub fn spender_role(self) -> TradeRole {
        self.roles().1
    }

    /// Role receiving the funds. Always the spender: each path pays the
    /// party that pulls the transaction.
    pub fn recipient_role(self) -> TradeRole {
        self.spender_role()
    }

    /// True for the three paths paying the buyer.
    pub fn is_release(self) -> bool {
        self.spender_role() == TradeRole::Buyer
    }

    fn roles(self) -> (TradeRole, TradeRole) {
        match self {
            ActionCode::SellerRelease => (TradeRole::Seller, TradeRole::Buyer),
            ActionCode::ArbiRelease => (TradeRole::Arbitrator, TradeRole::Buyer),
            ActionCode::BuyerReturn => (TradeRole::Buyer, TradeRole::Seller),
            ActionCode::ArbiReturn => (TradeRole::Arbitrator, TradeRole::Seller),
            ActionCode::ModRelease => (TradeRole::Moderator, TradeRole::Buyer),
            ActionCode::ModReturn => (TradeRole::Moderator, TradeRole::Seller),
        }
    }
}

impl FromStr for ActionCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionCode::from_wire(s.as_bytes())
    }
}
