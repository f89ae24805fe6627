// Domain separation constants for hash function calls
pub const SCHNORR_CHALLENGE_TAG: u8 = 0x00;
pub const PASSWORD_HASH_TAG: u8 = 0x01;
pub const PARTITION_TAG: u8 = 0x02;
pub const FINGERPRINT_TAG: u8 = 0x03;
