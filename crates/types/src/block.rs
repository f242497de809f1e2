//! The Calendar block format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The 64 hex zero characters used as the genesis block's `prevHash`.
pub fn zero_hash() -> String {
    "0".repeat(64)
}

/// The six block types the Calendar can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    /// The single genesis block at id 0.
    Gen,
    /// A calendar aggregation block.
    Cal,
    /// A NIST beacon block (recorded but not produced by this core).
    Nist,
    /// A Bitcoin anchor block: commits a root to a future Bitcoin transaction.
    #[serde(rename = "btc-a")]
    BtcA,
    /// A Bitcoin confirmation block: records the Bitcoin block that buried the anchor.
    #[serde(rename = "btc-c")]
    BtcC,
    /// A token reward block.
    Reward,
}

impl BlockType {
    /// The wire string used in `Block::type` and in `dataId`/log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Gen => "gen",
            BlockType::Cal => "cal",
            BlockType::Nist => "nist",
            BlockType::BtcA => "btc-a",
            BlockType::BtcC => "btc-c",
            BlockType::Reward => "reward",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current block schema version this core produces.
pub const BLOCK_VERSION: u32 = 1;

/// A single, immutable, signed Calendar block.
///
/// Field names follow the wire/JSON vocabulary (`stackId`, `dataId`,
/// `dataVal`, `prevHash`) rather than Rust snake_case, since this struct
/// *is* the wire format via `serde`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Monotonically increasing id; 0 is genesis.
    pub id: u64,
    /// Seconds since epoch at append time.
    pub time: i64,
    /// Schema version.
    pub version: u32,
    /// Opaque id of the deployment that wrote this block.
    #[serde(rename = "stackId")]
    pub stack_id: String,
    /// The block type.
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Type-specific small identifier (block height, tx id, etc).
    #[serde(rename = "dataId")]
    pub data_id: String,
    /// Type-specific payload (hex or utf-8 depending on type).
    #[serde(rename = "dataVal")]
    pub data_val: String,
    /// 64-hex-char hash of the immediately preceding block.
    #[serde(rename = "prevHash")]
    pub prev_hash: String,
    /// 64-hex-char hash of this block, per the construction in.
    pub hash: String,
    /// `fingerprint12:base64Signature` over `hash`.
    pub sig: String,
}

impl Block {
    /// Assembles the exact byte sequence that gets SHA-256'd to produce
    /// `hash`: `utf8("id:time:version:stackId:type:dataId") ||
    /// bytes(dataVal) || bytes(prevHash, hex)`.
    ///
    /// `dataVal` is interpreted as hex if it decodes cleanly as hex,
    /// utf-8 bytes otherwise — this mirrors the source format's permissive
    /// dual encoding (hex payloads for roots/heights, utf-8 for the
    /// genesis zero-fill and free-form reward descriptors).
    pub fn hash_preimage(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let header = format!(
            "{}:{}:{}:{}:{}:{}",
            self.id, self.time, self.version, self.stack_id, self.block_type, self.data_id
        );
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(&decode_data_val(&self.data_val));
        buf.extend_from_slice(
            &hex::decode(&self.prev_hash).unwrap_or_else(|_| self.prev_hash.clone().into_bytes()),
        );
        buf
    }
}

/// Decodes a `dataVal` string as hex when possible, falling back to its
/// raw utf-8 bytes. Hex decoding requires an even-length, all-hex string;
/// anything else (e.g. a reward descriptor like `"addr:100"`) is hashed
/// as utf-8.
pub fn decode_data_val(data_val: &str) -> Vec<u8> {
    if data_val.len() % 2 == 0 && data_val.chars().all(|c| c.is_ascii_hexdigit()) {
        if let Ok(bytes) = hex::decode(data_val) {
            return bytes;
        }
    }
    data_val.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_type_wire_strings_match_spec() {
        assert_eq!(BlockType::Gen.as_str(), "gen");
        assert_eq!(BlockType::BtcA.as_str(), "btc-a");
        assert_eq!(BlockType::BtcC.as_str(), "btc-c");
    }

    #[test]
    fn zero_hash_is_64_chars() {
        assert_eq!(zero_hash().len(), 64);
        assert!(zero_hash().chars().all(|c| c == '0'));
    }

    #[test]
    fn decode_data_val_prefers_hex() {
        assert_eq!(decode_data_val("aa"), vec![0xaa]);
        // Odd length -> not hex -> utf-8 fallback.
        assert_eq!(decode_data_val("abc"), b"abc".to_vec());
    }

    #[test]
    fn block_serializes_with_spec_field_names() {
        let b = Block {
            id: 0,
            time: 0,
            version: BLOCK_VERSION,
            stack_id: "s1".into(),
            block_type: BlockType::Gen,
            data_id: "0".into(),
            data_val: zero_hash(),
            prev_hash: zero_hash(),
            hash: zero_hash(),
            sig: "abc123456789:c2ln".into(),
        };
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["stackId"], "s1");
        assert_eq!(v["type"], "gen");
        assert_eq!(v["dataId"], "0");
        assert_eq!(v["dataVal"], zero_hash());
        assert_eq!(v["prevHash"], zero_hash());
    }
}
