//! Script opcodes, limits and verification flags

// Push opcodes
pub const OP_0: u8 = 0x00;
pub const OP_FALSE: u8 = OP_0;
pub const OP_DATA_75: u8 = 0x4b;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_TRUE: u8 = OP_1;
pub const OP_16: u8 = 0x60;

// Flow control
pub const OP_NOP: u8 = 0x61;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_RETURN: u8 = 0x6a;

// Stack
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_SWAP: u8 = 0x7c;

// Bitwise logic
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;

// Crypto
pub const OP_SHA256: u8 = 0xa8;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_HASH256: u8 = 0xaa;
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

/// Maximum script length
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum size of a single pushed element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum stack size during script execution
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of non-push operations in a script
pub const MAX_SCRIPT_OPS: usize = 201;

/// Maximum number of public keys in a multisig script
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Maximum payload of a standard null data output (OP_RETURN + pushes)
pub const MAX_DATA_CARRIER_SIZE: usize = 80;

/// Evaluate P2SH redeem scripts (BIP16)
pub const SCRIPT_VERIFY_P2SH: u32 = 1 << 0;

/// Evaluate segregated witness programs (BIP141)
pub const SCRIPT_VERIFY_WITNESS: u32 = 1 << 11;

/// Flags used when checking scripts produced by the signer
pub const STANDARD_VERIFY_FLAGS: u32 = SCRIPT_VERIFY_P2SH | SCRIPT_VERIFY_WITNESS;
