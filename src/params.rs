//! Network parameters that affect address text encodings

use serde::Serialize;

/// Per-network address prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainParams {
    pub name: &'static str,
    pub pubkey_hash_addr_id: u8,
    pub script_hash_addr_id: u8,
    pub bech32_hrp: &'static str,
}

pub const MAINNET: ChainParams = ChainParams {
    name: "mainnet",
    pubkey_hash_addr_id: 0x00,
    script_hash_addr_id: 0x05,
    bech32_hrp: "bc",
};

pub const TESTNET: ChainParams = ChainParams {
    name: "testnet3",
    pubkey_hash_addr_id: 0x6f,
    script_hash_addr_id: 0xc4,
    bech32_hrp: "tb",
};

pub const REGTEST: ChainParams = ChainParams {
    name: "regtest",
    pubkey_hash_addr_id: 0x6f,
    script_hash_addr_id: 0xc4,
    bech32_hrp: "bcrt",
};

impl Default for ChainParams {
    fn default() -> Self {
        MAINNET
    }
}
