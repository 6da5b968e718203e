mod rest;
pub mod signer;

pub use rest::BtcTurkClient;
pub use signer::{sign, SignedStamp};
