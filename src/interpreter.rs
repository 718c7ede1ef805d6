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

//! Local evaluation of a signed input against the output it spends.
//!
//! This is not a consensus engine; it covers exactly the opcode subset the
//! covenant and the wallet's pay-to-pubkey-hash outputs use, so a signed
//! transaction can be checked end-to-end before broadcast. Both signature
//! schemes are enforced: data signatures over the single SHA-256 digest of
//! the presented message, and transaction signatures over the replay
//! protected preimage of [`crate::sighash`].

use bitcoin::blockdata::opcodes::{all, All};
use bitcoin::blockdata::script::{Instruction, Script};
use bitcoin::blockdata::transaction::{Transaction, TxOut};
use bitcoin::hashes::{hash160, sha256, Hash};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1};
use thiserror::Error;

use crate::script::{OP_CHECKDATASIG, OP_CHECKDATASIGVERIFY};
use crate::sighash::{signature_hash, TxInRef, SIGHASH_ALL_FORKID};

/// Errors when evaluating a spend.
#[derive(Error, Debug)]
pub enum Error {
    /// The referenced input does not exist.
    #[error("Input index out of bounds")]
    InputOutOfBounds,
    /// The bytecode does not scan as a sequence of instructions.
    #[error("Malformed script bytecode")]
    MalformedScript,
    /// An unlocking script may only push data.
    #[error("Opcode in unlocking script")]
    NonPushUnlock,
    /// The pushed redeem script does not hash to the spent output's
    /// commitment.
    #[error("Redeem script does not match the spent output")]
    ScriptHashMismatch,
    /// A stack operation needed more elements than present.
    #[error("Stack underflow")]
    StackUnderflow,
    /// OP_ELSE or OP_ENDIF without a matching OP_IF.
    #[error("Unbalanced conditional")]
    UnbalancedConditional,
    /// An opcode outside the supported covenant subset.
    #[error("Unsupported opcode {0:?}")]
    UnsupportedOpcode(All),
    /// A transaction signature must end with the fork-id sighash byte.
    #[error("Unsupported sighash type {0:#x}")]
    UnsupportedSighashType(u8),
    /// A signature push was empty or not DER.
    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
    /// An OP_*VERIFY opcode consumed a false result.
    #[error("Verification failed on {0:?}")]
    VerifyFailed(All),
    /// The script completed with a false or missing top stack element.
    #[error("Script evaluated to false")]
    EvaluatedFalse,
}

struct Context<'a> {
    transaction: &'a Transaction,
    index: usize,
    value: u64,
    script_code: &'a Script,
}

fn cast_to_bool(data: &[u8]) -> bool {
    for (i, byte) in data.iter().enumerate() {
        if *byte != 0 {
            // Negative zero is false.
            return !(i == data.len() - 1 && *byte == 0x80);
        }
    }
    false
}

fn encode_bool(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        vec![]
    }
}

fn pop(stack: &mut Vec<Vec<u8>>) -> Result<Vec<u8>, Error> {
    stack.pop().ok_or(Error::StackUnderflow)
}

fn check_transaction_signature(
    ctx: &Context,
    signature: &[u8],
    pubkey: &[u8],
) -> Result<bool, Error> {
    let (sighash_byte, der) = signature.split_last().ok_or(Error::StackUnderflow)?;
    if *sighash_byte as u32 != SIGHASH_ALL_FORKID {
        return Err(Error::UnsupportedSighashType(*sighash_byte));
    }
    let signature = Signature::from_der(der)?;
    let pubkey = PublicKey::from_slice(pubkey)?;
    let digest = signature_hash(
        TxInRef::new(ctx.transaction, ctx.index),
        ctx.script_code,
        ctx.value,
        SIGHASH_ALL_FORKID,
    );
    let message = Message::from_slice(&digest.into_inner())?;
    let secp = Secp256k1::verification_only();
    Ok(secp.verify_ecdsa(&message, &signature, &pubkey).is_ok())
}

fn check_data_signature(signature: &[u8], message: &[u8], pubkey: &[u8]) -> Result<bool, Error> {
    let signature = Signature::from_der(signature)?;
    let pubkey = PublicKey::from_slice(pubkey)?;
    let digest = sha256::Hash::hash(message);
    let message = Message::from_slice(&digest.into_inner())?;
    let secp = Secp256k1::verification_only();
    Ok(secp.verify_ecdsa(&message, &signature, &pubkey).is_ok())
}

fn execute(script: &Script, stack: &mut Vec<Vec<u8>>, ctx: &Context) -> Result<(), Error> {
    let mut altstack: Vec<Vec<u8>> = Vec::new();
    // One flag per open conditional; an instruction runs when all are true.
    let mut exec_stack: Vec<bool> = Vec::new();

    for instruction in script.instructions() {
        let instruction = instruction.map_err(|_| Error::MalformedScript)?;
        let executing = exec_stack.iter().all(|flag| *flag);

        let op = match instruction {
            Instruction::PushBytes(data) => {
                if executing {
                    stack.push(data.to_vec());
                }
                continue;
            }
            Instruction::Op(op) => op,
        };

        // Conditionals are tracked even on skipped branches.
        if op == all::OP_IF {
            if executing {
                let condition = pop(stack)?;
                exec_stack.push(cast_to_bool(&condition));
            } else {
                exec_stack.push(false);
            }
            continue;
        } else if op == all::OP_ELSE {
            let flag = exec_stack.last_mut().ok_or(Error::UnbalancedConditional)?;
            *flag = !*flag;
            continue;
        } else if op == all::OP_ENDIF {
            exec_stack.pop().ok_or(Error::UnbalancedConditional)?;
            continue;
        }

        if !executing {
            continue;
        }

        if op == all::OP_DUP {
            let top = stack.last().ok_or(Error::StackUnderflow)?.clone();
            stack.push(top);
        } else if op == all::OP_OVER {
            if stack.len() < 2 {
                return Err(Error::StackUnderflow);
            }
            let item = stack[stack.len() - 2].clone();
            stack.push(item);
        } else if op == all::OP_SWAP {
            let len = stack.len();
            if len < 2 {
                return Err(Error::StackUnderflow);
            }
            stack.swap(len - 1, len - 2);
        } else if op == all::OP_TOALTSTACK {
            altstack.push(pop(stack)?);
        } else if op == all::OP_FROMALTSTACK {
            stack.push(altstack.pop().ok_or(Error::StackUnderflow)?);
        } else if op == all::OP_CAT {
            let suffix = pop(stack)?;
            let mut prefix = pop(stack)?;
            prefix.extend(suffix);
            stack.push(prefix);
        } else if op == all::OP_HASH160 {
            let data = pop(stack)?;
            stack.push(hash160::Hash::hash(&data).into_inner().to_vec());
        } else if op == all::OP_EQUAL || op == all::OP_EQUALVERIFY {
            let a = pop(stack)?;
            let b = pop(stack)?;
            let equal = a == b;
            if op == all::OP_EQUALVERIFY {
                if !equal {
                    return Err(Error::VerifyFailed(op));
                }
            } else {
                stack.push(encode_bool(equal));
            }
        } else if op == all::OP_CHECKSIG {
            let pubkey = pop(stack)?;
            let signature = pop(stack)?;
            let valid = check_transaction_signature(ctx, &signature, &pubkey)?;
            stack.push(encode_bool(valid));
        } else if op == OP_CHECKDATASIG || op == OP_CHECKDATASIGVERIFY {
            let pubkey = pop(stack)?;
            let message = pop(stack)?;
            let signature = pop(stack)?;
            let valid = check_data_signature(&signature, &message, &pubkey)?;
            if op == OP_CHECKDATASIGVERIFY {
                if !valid {
                    return Err(Error::VerifyFailed(op));
                }
            } else {
                stack.push(encode_bool(valid));
            }
        } else {
            return Err(Error::UnsupportedOpcode(op));
        }
    }

    if exec_stack.is_empty() {
        Ok(())
    } else {
        Err(Error::UnbalancedConditional)
    }
}

/// Evaluate input `index` of `tx` against the output it spends. Handles the
/// pay-to-script-hash escrow output (the last unlocking push is the redeem
/// script and must hash to the output's commitment) and bare locking
/// scripts such as the wallet's pay-to-pubkey-hash outputs.
pub fn verify_spend(tx: &Transaction, index: usize, spent: &TxOut) -> Result<(), Error> {
    let input = tx.input.get(index).ok_or(Error::InputOutOfBounds)?;

    let mut stack: Vec<Vec<u8>> = Vec::new();
    for instruction in input.script_sig.instructions() {
        match instruction.map_err(|_| Error::MalformedScript)? {
            Instruction::PushBytes(data) => stack.push(data.to_vec()),
            Instruction::Op(_) => return Err(Error::NonPushUnlock),
        }
    }

    if spent.script_pubkey.is_p2sh() {
        let redeem = Script::from(pop(&mut stack)?);
        if redeem.to_p2sh() != spent.script_pubkey {
            return Err(Error::ScriptHashMismatch);
        }
        let ctx = Context {
            transaction: tx,
            index,
            value: spent.value,
            script_code: &redeem,
        };
        execute(&redeem, &mut stack, &ctx)?;
    } else {
        let ctx = Context {
            transaction: tx,
            index,
            value: spent.value,
            script_code: &spent.script_pubkey,
        };
        execute(&spent.script_pubkey, &mut stack, &ctx)?;
    }

    match stack.pop() {
        Some(top) if cast_to_bool(&top) => Ok(()),
        _ => Err(Error::EvaluatedFalse),
    }
}
