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

//! Transaction fee unit type and the two fee computations of the protocol:
//! the dispute/security-deposit fee charged on the escrowed amount, and the
//! mining fee of a covenant spend, which scales with the size of the
//! unusually large, branchy redeem script rather than with input and
//! output counts alone.
//!
//! ```rust
//! use escrow_core::fee::SatPerKvB;
//!
//!# fn main() -> Result<(), escrow_core::fee::ParseError> {
//! // Parse an amount suffixed with '/kvB'
//! let rate = "100 satoshi/kvB".parse::<SatPerKvB>()?;
//!
//! // Always displayed as 'satoshi/kvB'
//! assert_eq!("100 satoshi/kvB", format!("{}", rate));
//!# Ok(())
//!# }
//! ```

use bitcoin::util::amount::Denomination;
use bitcoin::Amount;

use std::cmp;
use std::str::FromStr;

use serde::ser::{Serialize, Serializer};
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;

/// The unit used to measure a quantity, or weight, for a transaction. This
/// represents 1'000 bytes of raw transaction.
pub const WEIGHT_UNIT: &str = "kvB";

/// Minimum economically spendable output value of the ledger, in satoshis.
/// The dispute fee never falls below this floor.
pub const DUST_LIMIT: u64 = 546;

/// Errors when parsing a fee rate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The string is not an amount followed by a weight unit.
    #[error("sat/kvB format is not respected")]
    InvalidFormat,
    /// The amount part is not a valid satoshi quantity.
    #[error("Amount parse failed: {0}")]
    InvalidAmount(#[from] bitcoin::util::amount::ParseAmountError),
    /// The weight unit part is not [`WEIGHT_UNIT`].
    #[error("Weight unit parse failed")]
    InvalidWeightUnit,
}

/// An amount of satoshis per 1'000 bytes that a transaction must pay in
/// fees for timely inclusion.
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Hash, Eq, Display)]
#[display(display_sat_per_kvb)]
pub struct SatPerKvB(Amount);

fn display_sat_per_kvb(rate: &SatPerKvB) -> String {
    format!(
        "{}/{}",
        rate.as_native_unit()
            .to_string_with_denomination(Denomination::Satoshi),
        WEIGHT_UNIT
    )
}

impl SatPerKvB {
    /// Create a fee quantity of given satoshis per kilobyte.
    pub fn from_sat(satoshis: u64) -> Self {
        SatPerKvB(Amount::from_sat(satoshis))
    }

    /// Return the number of satoshis per kilobyte.
    pub fn as_sat(&self) -> u64 {
        self.0.as_sat()
    }

    /// Create a fee quantity from the native amount type.
    pub fn from_native_unit(amount: Amount) -> Self {
        SatPerKvB(amount)
    }

    /// Return the rate as the native amount type.
    pub fn as_native_unit(&self) -> Amount {
        self.0
    }
}

impl Serialize for SatPerKvB {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(format!("{}", self).as_ref())
    }
}

impl<'de> Deserialize<'de> for SatPerKvB {
    fn deserialize<D>(deserializer: D) -> Result<SatPerKvB, D::Error>
    where
        D: Deserializer<'de>,
    {
        SatPerKvB::from_str(&String::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

impl FromStr for SatPerKvB {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('/').collect::<Vec<&str>>();
        if parts.len() != 2 {
            return Err(ParseError::InvalidFormat);
        }
        let amount = parts[0].parse::<Amount>()?;
        match parts[1] {
            WEIGHT_UNIT => Ok(Self(amount)),
            _ => Err(ParseError::InvalidWeightUnit),
        }
    }
}

/// Security/dispute fee charged on an escrowed amount: one percent,
/// truncated to whole satoshis, floored at [`DUST_LIMIT`].
pub fn dispute_fee(amount: Amount) -> Amount {
    Amount::from_sat(cmp::max(amount.as_sat() / 100, DUST_LIMIT))
}

// Upper-bound sizes of the unlocking stack elements: a DER transaction
// signature plus sighash byte, a compressed public key, the oracle DER
// signature, the oracle public key, and the two-byte action code, each
// with its push prefix.
const COVENANT_UNLOCK_OVERHEAD: usize = 74 + 34 + 73 + 34 + 3;

// Signature + public key with push prefixes.
const P2PKH_UNLOCK_LEN: usize = 74 + 34;

// Value, script length prefix, and a 25-byte p2pkh/p2sh-sized script.
const OUTPUT_LEN: usize = 8 + 1 + 25;

fn push_len(data_len: usize) -> usize {
    // Direct push up to 75 bytes, OP_PUSHDATA1 up to 255, OP_PUSHDATA2 above.
    let prefix = if data_len < 76 {
        1
    } else if data_len < 256 {
        2
    } else {
        3
    };
    prefix + data_len
}

fn compact_size(n: usize) -> usize {
    if n < 0xFD {
        1
    } else {
        3
    }
}

fn base_size(input_count: usize, output_count: usize, unlock_len: usize) -> usize {
    let input_len = 36 + 4 + compact_size(unlock_len) + unlock_len;
    4 + compact_size(input_count)
        + input_count * input_len
        + compact_size(output_count)
        + output_count * OUTPUT_LEN
        + 4
}

/// Estimated serialized size in bytes of a covenant spend: the redeem
/// script is pushed in full inside every covenant input, so the estimate is
/// monotonically non-decreasing in `redeem_len`.
pub fn estimated_spend_size(input_count: usize, output_count: usize, redeem_len: usize) -> usize {
    base_size(
        input_count,
        output_count,
        COVENANT_UNLOCK_OVERHEAD + push_len(redeem_len),
    )
}

/// Estimated serialized size in bytes of a plain wallet spend (deposit
/// splitting).
pub fn estimated_wallet_size(input_count: usize, output_count: usize) -> usize {
    base_size(input_count, output_count, P2PKH_UNLOCK_LEN)
}

/// Mining fee for a transaction of `size` bytes at the given rate, rounded
/// up to the next satoshi.
pub fn mining_fee(rate: SatPerKvB, size: usize) -> Amount {
    Amount::from_sat((rate.as_sat() * size as u64 + 999) / 1000)
}
