//! Format constants and magic bytes for tile payloads

/// Block payload format constants
pub mod payload {
    /// Magic bytes opening every block payload
    pub const MAGIC: [u8; 4] = *b"TILE";

    /// Current payload format version
    pub const VERSION: u8 = 1;

    /// Fixed part of the payload header: magic, version, dtype, reserved, ndim
    pub const FIXED_HEADER_SIZE: usize = 12;

    /// Bytes per encoded dimension
    pub const DIM_SIZE: usize = 8;

    /// Upper bound on array rank accepted when decoding
    pub const MAX_NDIM: u32 = 32;
}
