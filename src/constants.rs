// Election-wide limits
pub const DEFAULT_SECURITY_BITS: usize = 512;
// smallest safe prime glass_pumpkin will generate
pub const MIN_SECURITY_BITS: usize = 128;
pub const MAX_SECURITY_BITS: usize = 4096;

pub const MIN_BALLOT_BOX_COUNT: usize = 2;
pub const MAX_BALLOT_BOX_COUNT: usize = 1000;

// Voter identifiers: 2 chars from each class plus filler, shuffled
pub const IDENTIFIER_LENGTH: usize = 10;
pub const IDENTIFIER_CHARS_PER_CLASS: usize = 2;
pub const IDENTIFIER_SYMBOLS: &[u8] = b"!@#$%^&*()_+";

pub const SALT_LENGTH: usize = 16;
