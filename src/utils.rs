//! Utility functions for report identifiers

use bech32::Bech32m;
use uuid7::uuid7;

// time-ordered, so sorted storage keys follow insertion order
pub fn new_report_key() -> [u8; 16] {
    *uuid7().as_bytes()
}

// encode a storage key as a human readable document id
pub fn key_to_bech32(hrp: &str, key: &[u8]) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, key)?;
    Ok(encode)
}
