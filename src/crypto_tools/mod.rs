pub mod arith;
pub mod constants;
pub mod elgamal;
pub mod hash;
pub mod schnorr;
