/// Length in bytes of a field element slot.
pub const ELEM_BYTES_LEN: usize = 32;

/// Length in bytes of a hash.
pub const HASH_LEN: usize = 32;

/// Usable payload bytes of a slot. Byte 0 is reserved and always zero.
pub const ELEM_PAYLOAD_LEN: usize = 31;

/// Number of index slots in an entry.
pub const INDEX_SLOTS: usize = 4;

/// Number of value slots in an entry.
pub const VALUE_SLOTS: usize = 4;

/// Number of slots in an entry.
pub const DATA_LEN: usize = INDEX_SLOTS + VALUE_SLOTS;

/// Serialized length of an entry.
pub const ENTRY_BYTES_LEN: usize = DATA_LEN * ELEM_BYTES_LEN;

/// Default number of levels for every identity tree.
pub const DEFAULT_TREE_LEVELS: usize = 140;

/// BN254 scalar field modulus, big-endian.
pub const FIELD_MODULUS_BE: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// Length in bytes of an identifier.
pub const ID_LEN: usize = 31;

/// Length in bytes of the identifier type prefix.
pub const ID_TYPE_LEN: usize = 2;

/// Length in bytes of the genesis part of an identifier.
pub const ID_GENESIS_LEN: usize = 27;

/// Length in bytes of the identifier checksum.
pub const ID_CHECKSUM_LEN: usize = 2;
