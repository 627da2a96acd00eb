//! Script parsing, building and standard templates

use crate::address::Address;
use crate::constants::*;
use crate::error::{Result, SignError};
use crate::types::ByteString;

/// One opcode of a parsed script together with the data it pushes, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOpcode {
    pub opcode: u8,
    pub data: ByteString,
}

impl ParsedOpcode {
    /// True for opcodes that only push data (OP_0 through OP_16).
    pub fn is_push(&self) -> bool {
        self.opcode <= OP_16
    }

    /// Value placed on the stack by a push opcode.
    pub fn pushed_value(&self) -> Option<ByteString> {
        match self.opcode {
            OP_0..=OP_PUSHDATA4 => Some(self.data.clone()),
            OP_1NEGATE => Some(vec![0x81]),
            OP_1..=OP_16 => Some(vec![self.opcode - OP_1 + 1]),
            // OP_RESERVED pushes nothing
            _ => None,
        }
    }
}

/// Split a serialized script into opcodes.
///
/// Fails on pushes that run past the end of the script.
pub fn parse_script(script: &[u8]) -> Result<Vec<ParsedOpcode>> {
    let mut ops = Vec::new();
    let mut pos = 0usize;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;

        let data_len = match opcode {
            0x01..=OP_DATA_75 => opcode as usize,
            OP_PUSHDATA1 => {
                let len = read_push_len(script, pos, 1)?;
                pos += 1;
                len
            }
            OP_PUSHDATA2 => {
                let len = read_push_len(script, pos, 2)?;
                pos += 2;
                len
            }
            OP_PUSHDATA4 => {
                let len = read_push_len(script, pos, 4)?;
                pos += 4;
                len
            }
            _ => 0,
        };

        let end = pos
            .checked_add(data_len)
            .filter(|end| *end <= script.len())
            .ok_or_else(|| {
                SignError::ScriptParse(format!(
                    "opcode 0x{:02x} pushes {} bytes but only {} remain",
                    opcode,
                    data_len,
                    script.len() - pos.min(script.len())
                ))
            })?;

        ops.push(ParsedOpcode {
            opcode,
            data: script[pos..end].to_vec(),
        });
        pos = end;
    }

    Ok(ops)
}

fn read_push_len(script: &[u8], pos: usize, width: usize) -> Result<usize> {
    if pos + width > script.len() {
        return Err(SignError::ScriptParse(format!(
            "truncated {}-byte push length",
            width
        )));
    }
    let mut len = 0usize;
    for (i, byte) in script[pos..pos + width].iter().enumerate() {
        len |= (*byte as usize) << (8 * i);
    }
    Ok(len)
}

/// All data pushed by `script`, in order. Non-push opcodes are ignored.
pub fn pushed_data(script: &[u8]) -> Result<Vec<ByteString>> {
    Ok(parse_script(script)?
        .iter()
        .filter_map(ParsedOpcode::pushed_value)
        .collect())
}

/// True when every opcode in the parsed script is a push.
pub fn is_push_only(ops: &[ParsedOpcode]) -> bool {
    ops.iter().all(ParsedOpcode::is_push)
}

/// Incremental script builder using minimal push encodings.
///
/// Errors are deferred until [`ScriptBuilder::into_script`] so calls can be
/// chained.
#[derive(Debug, Default, Clone)]
pub struct ScriptBuilder {
    script: ByteString,
    err: Option<String>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.script.push(opcode);
        self
    }

    /// Push a small integer, using OP_0 / OP_1NEGATE / OP_1..OP_16 where possible.
    pub fn push_int(mut self, value: i64) -> Self {
        if value == 0 {
            self.script.push(OP_0);
            return self;
        }
        if value == -1 || (1..=16).contains(&value) {
            self.script.push((OP_1 as i64 - 1 + value) as u8);
            return self;
        }
        let encoded = encode_script_num(value);
        self.push_data(&encoded)
    }

    /// Push `data` with the smallest encoding consensus accepts as minimal.
    pub fn push_data(mut self, data: &[u8]) -> Self {
        if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            self.err.get_or_insert_with(|| {
                format!(
                    "push of {} bytes exceeds the {} byte element limit",
                    data.len(),
                    MAX_SCRIPT_ELEMENT_SIZE
                )
            });
            return self;
        }

        match data.len() {
            0 => self.script.push(OP_0),
            1 if (1..=16).contains(&data[0]) => self.script.push(OP_1 - 1 + data[0]),
            1 if data[0] == 0x81 => self.script.push(OP_1NEGATE),
            len if len <= OP_DATA_75 as usize => {
                self.script.push(len as u8);
                self.script.extend_from_slice(data);
            }
            len if len <= 0xff => {
                self.script.push(OP_PUSHDATA1);
                self.script.push(len as u8);
                self.script.extend_from_slice(data);
            }
            len => {
                self.script.push(OP_PUSHDATA2);
                self.script.extend_from_slice(&(len as u16).to_le_bytes());
                self.script.extend_from_slice(data);
            }
        }
        self
    }

    pub fn into_script(self) -> Result<ByteString> {
        if let Some(err) = self.err {
            return Err(SignError::ScriptBuild(err));
        }
        if self.script.len() > MAX_SCRIPT_SIZE {
            return Err(SignError::ScriptBuild(format!(
                "script of {} bytes exceeds the {} byte limit",
                self.script.len(),
                MAX_SCRIPT_SIZE
            )));
        }
        Ok(self.script)
    }
}

/// Minimal little-endian sign-magnitude encoding of a script number.
pub fn encode_script_num(value: i64) -> ByteString {
    if value == 0 {
        return vec![];
    }
    let negative = value < 0;
    let mut abs = value.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    if out.last().map_or(false, |b| b & 0x80 != 0) {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        if let Some(last) = out.last_mut() {
            *last |= 0x80;
        }
    }
    out
}

/// Build a script that pushes every element of `stack` in order.
pub fn push_stack_script(stack: &[ByteString]) -> Result<ByteString> {
    stack
        .iter()
        .fold(ScriptBuilder::new(), |builder, element| builder.push_data(element))
        .into_script()
}

/// <pubkey> OP_CHECKSIG
pub fn pay_to_pubkey(serialized_pubkey: &[u8]) -> Result<ByteString> {
    ScriptBuilder::new()
        .push_data(serialized_pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG
pub fn pay_to_pubkey_hash(pubkey_hash: &[u8; 20]) -> Result<ByteString> {
    ScriptBuilder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_data(pubkey_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// OP_HASH160 <hash> OP_EQUAL
pub fn pay_to_script_hash(script_hash: &[u8; 20]) -> Result<ByteString> {
    ScriptBuilder::new()
        .push_opcode(OP_HASH160)
        .push_data(script_hash)
        .push_opcode(OP_EQUAL)
        .into_script()
}

/// OP_0 <20-byte hash>
pub fn pay_to_witness_pubkey_hash(pubkey_hash: &[u8; 20]) -> Result<ByteString> {
    ScriptBuilder::new()
        .push_opcode(OP_0)
        .push_data(pubkey_hash)
        .into_script()
}

/// OP_0 <32-byte hash>
pub fn pay_to_witness_script_hash(script_hash: &[u8; 32]) -> Result<ByteString> {
    ScriptBuilder::new()
        .push_opcode(OP_0)
        .push_data(script_hash)
        .into_script()
}

/// m <pubkey>... n OP_CHECKMULTISIG
pub fn multisig_script(pubkeys: &[ByteString], n_required: usize) -> Result<ByteString> {
    if n_required == 0 || n_required > pubkeys.len() || pubkeys.len() > MAX_PUBKEYS_PER_MULTISIG {
        return Err(SignError::ScriptBuild(format!(
            "invalid multisig parameters: {} of {}",
            n_required,
            pubkeys.len()
        )));
    }
    pubkeys
        .iter()
        .fold(ScriptBuilder::new().push_int(n_required as i64), |builder, key| {
            builder.push_data(key)
        })
        .push_int(pubkeys.len() as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// OP_RETURN <data>
pub fn null_data_script(data: &[u8]) -> Result<ByteString> {
    if data.len() > MAX_DATA_CARRIER_SIZE {
        return Err(SignError::ScriptBuild(format!(
            "data carrier of {} bytes exceeds {}",
            data.len(),
            MAX_DATA_CARRIER_SIZE
        )));
    }
    ScriptBuilder::new()
        .push_opcode(OP_RETURN)
        .push_data(data)
        .into_script()
}

/// Locking script paying to `address`.
pub fn pay_to_address(address: &Address) -> Result<ByteString> {
    match address {
        Address::PubKeyHash(hash) => pay_to_pubkey_hash(hash),
        Address::ScriptHash(hash) => pay_to_script_hash(hash),
        Address::PubKey(key) => pay_to_pubkey(key),
        Address::WitnessPubKeyHash(hash) => pay_to_witness_pubkey_hash(hash),
        Address::WitnessScriptHash(hash) => pay_to_witness_script_hash(hash),
    }
}
