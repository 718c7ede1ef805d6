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

//! Escrow covenant protocol core library.
//!
//! Two counterparties trade a ledger's native token with the funds held by a
//! neutral covenant script until release. A moderator and an arbitrator can
//! break deadlocks or resolve disputes. The crate covers the cryptographic
//! core of the protocol:
//!
//! - [`script`]: the locking script committing to the four participants' key
//!   hashes and a per-order nonce, encoding six mutually-exclusive release
//!   paths.
//! - [`oracle`]: the data-signature scheme a privileged party uses to
//!   authorize one path.
//! - [`unlock`]: the unlocking-script factories producing the spending side
//!   of the covenant.
//! - [`fee`] and [`utxo`]: dispute fee, mining fee from script size, coin
//!   selection and exact-value splitting.
//! - [`transaction`]: assembly and signing of the broadcastable transaction.
//!
//! Everything in the core is a synchronous, pure computation over byte
//! buffers and keys. Broadcasting, persistence, and funding detection are
//! performed by external collaborators behind the [`syncer`] seams.

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate serde;

pub mod action;
pub mod fee;
pub mod interpreter;
pub mod oracle;
pub mod order;
pub mod role;
pub mod script;
pub mod sighash;
pub mod syncer;
pub mod transaction;
pub mod unlock;
pub mod utxo;
