//! Canonical 80-byte block-header encoding.
//!
//! Block identity and the stored `header` column both use the chain's
//! native serialization: every field is little-endian (byte-reversed
//! relative to its big-endian display form), so downstream consumers can
//! hash the stored bytes directly for proof-of-work checks.

use bitcoin::block::{Header, Version};
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, CompactTarget, TxMerkleNode};

use crate::error::{Error, Result};

/// Length of a serialized block header.
pub const HEADER_LEN: usize = 80;

/// Encode a block header into its canonical 80-byte form.
///
/// Layout: version (4) | prev block hash (32) | merkle root (32) |
/// time (4) | bits (4) | nonce (4), all little-endian.
pub fn encode_header(header: &Header) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0..4].copy_from_slice(&header.version.to_consensus().to_le_bytes());
    out[4..36].copy_from_slice(&header.prev_blockhash.to_byte_array());
    out[36..68].copy_from_slice(&header.merkle_root.to_byte_array());
    out[68..72].copy_from_slice(&header.time.to_le_bytes());
    out[72..76].copy_from_slice(&header.bits.to_consensus().to_le_bytes());
    out[76..80].copy_from_slice(&header.nonce.to_le_bytes());
    out
}

/// Decode an 80-byte canonical header back into its fields.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() != HEADER_LEN {
        return Err(Error::import(format!(
            "header must be {} bytes, got {}",
            HEADER_LEN,
            bytes.len()
        )));
    }

    let word = |at: usize| -> [u8; 4] { bytes[at..at + 4].try_into().expect("4-byte slice") };
    let hash = |at: usize| -> [u8; 32] { bytes[at..at + 32].try_into().expect("32-byte slice") };

    Ok(Header {
        version: Version::from_consensus(i32::from_le_bytes(word(0))),
        prev_blockhash: BlockHash::from_byte_array(hash(4)),
        merkle_root: TxMerkleNode::from_byte_array(hash(36)),
        time: u32::from_le_bytes(word(68)),
        bits: CompactTarget::from_consensus(u32::from_le_bytes(word(72))),
        nonce: u32::from_le_bytes(word(76)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::consensus;

    // Mainnet genesis block header.
    const GENESIS_HEADER_HEX: &str = "01000000000000000000000000000000000000000000000000\
         00000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa\
         4b1e5e4a29ab5f49ffff001d1dac2b7c";

    fn genesis_header() -> Header {
        let bytes = hex::decode(GENESIS_HEADER_HEX).unwrap();
        decode_header(&bytes).unwrap()
    }

    #[test]
    fn test_decode_genesis_fields() {
        let header = genesis_header();
        assert_eq!(header.version.to_consensus(), 1);
        assert_eq!(header.prev_blockhash, BlockHash::all_zeros());
        assert_eq!(header.time, 1231006505);
        assert_eq!(header.bits.to_consensus(), 0x1d00ffff);
        assert_eq!(header.nonce, 2083236893);
        assert_eq!(
            header.block_hash().to_string(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
    }

    #[test]
    fn test_header_round_trip() {
        let header = genesis_header();
        let encoded = encode_header(&header);
        assert_eq!(decode_header(&encoded).unwrap(), header);
    }

    #[test]
    fn test_encoding_matches_native_serialization() {
        let header = genesis_header();
        assert_eq!(
            encode_header(&header).to_vec(),
            consensus::serialize(&header)
        );
        assert_eq!(hex::encode(encode_header(&header)), GENESIS_HEADER_HEX);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(decode_header(&[0u8; 79]).is_err());
        assert!(decode_header(&[0u8; 81]).is_err());
    }
}
