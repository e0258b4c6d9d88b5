//! Minimal ABI argument encoding for the handful of framework calls the
//! CLI makes. Covers static words (address, bytes32, uint) and dynamic
//! byte strings; anything fancier belongs in a contract toolchain, not
//! here.

use anyhow_source_location::format_error;
use std::sync::Arc;
use tiny_keccak::{Hasher, Keccak};

const WORD_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub enum Token {
    Address(Arc<str>),
    Bytes32([u8; WORD_SIZE]),
    Uint(u128),
    Bytes(Vec<u8>),
    Str(Arc<str>),
}

impl Token {
    pub fn bytes32_from_hex(hex: &str) -> anyhow::Result<Token> {
        let bytes = decode_hex(strip_hex_prefix(hex))?;
        if bytes.len() != WORD_SIZE {
            return Err(format_error!("Expected a 32 byte hex value, got {hex}"));
        }
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(&bytes);
        Ok(Token::Bytes32(word))
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Token::Bytes(_) | Token::Str(_))
    }

    fn dynamic_bytes(&self) -> Option<&[u8]> {
        match self {
            Token::Bytes(bytes) => Some(bytes.as_slice()),
            Token::Str(value) => Some(value.as_bytes()),
            _ => None,
        }
    }

    fn head_word(&self) -> anyhow::Result<[u8; WORD_SIZE]> {
        let mut word = [0u8; WORD_SIZE];
        match self {
            Token::Address(address) => {
                let bytes = decode_hex(strip_hex_prefix(address.as_ref()))?;
                if bytes.len() != 20 {
                    return Err(format_error!("Invalid address {address}"));
                }
                word[WORD_SIZE - 20..].copy_from_slice(&bytes);
            }
            Token::Bytes32(value) => {
                word.copy_from_slice(value);
            }
            Token::Uint(value) => {
                word[WORD_SIZE - 16..].copy_from_slice(&value.to_be_bytes());
            }
            Token::Bytes(_) | Token::Str(_) => {
                return Err(format_error!("Dynamic token has no static head word"));
            }
        }
        Ok(word)
    }
}

/// Encodes a flat argument list using the standard head/tail layout.
/// Returns hex without the `0x` prefix so callers can append it to either
/// bytecode or a selector.
pub fn encode(tokens: &[Token]) -> anyhow::Result<String> {
    let head_size = tokens.len() * WORD_SIZE;
    let mut heads: Vec<u8> = Vec::with_capacity(head_size);
    let mut tail: Vec<u8> = Vec::new();

    for token in tokens {
        if let Some(bytes) = token.dynamic_bytes() {
            let offset = head_size + tail.len();
            heads.extend_from_slice(&uint_word(offset as u128));
            tail.extend_from_slice(&uint_word(bytes.len() as u128));
            tail.extend_from_slice(bytes);
            let padding = (WORD_SIZE - bytes.len() % WORD_SIZE) % WORD_SIZE;
            tail.extend(std::iter::repeat(0u8).take(padding));
        } else {
            heads.extend_from_slice(&token.head_word()?);
        }
    }

    heads.extend_from_slice(&tail);
    Ok(hex::encode(&heads))
}

fn uint_word(value: u128) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn keccak256(data: &[u8]) -> [u8; WORD_SIZE] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; WORD_SIZE];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// First four bytes of the keccak-256 hash of the canonical signature,
/// hex encoded without the `0x` prefix.
pub fn selector(signature: &str) -> String {
    let hash = keccak256(signature.as_bytes());
    hex::encode(&hash[..4])
}

/// Hash of a role identifier string, as the ACL stores it.
pub fn role_hash(role: &str) -> [u8; WORD_SIZE] {
    keccak256(role.as_bytes())
}

/// ENS namehash: fold keccak over the labels from right to left, starting
/// from the zero node.
pub fn namehash(name: &str) -> [u8; WORD_SIZE] {
    let mut node = [0u8; WORD_SIZE];
    if name.is_empty() {
        return node;
    }
    for label in name.split('.').rev() {
        let label_hash = keccak256(label.as_bytes());
        let mut packed = [0u8; WORD_SIZE * 2];
        packed[..WORD_SIZE].copy_from_slice(&node);
        packed[WORD_SIZE..].copy_from_slice(&label_hash);
        node = keccak256(&packed);
    }
    node
}

pub fn strip_hex_prefix(hex: &str) -> &str {
    hex.strip_prefix("0x").unwrap_or(hex)
}

pub fn decode_hex(value: &str) -> anyhow::Result<Vec<u8>> {
    hex::decode(value).map_err(|_| format_error!("Invalid hex value: {value}"))
}

/// Extracts the trailing 20 byte address from a 32 byte return word or
/// log topic.
pub fn address_from_word(word: &str) -> anyhow::Result<Arc<str>> {
    let word = strip_hex_prefix(word);
    if word.len() < 40 {
        return Err(format_error!("Word {word} is too short to hold an address"));
    }
    Ok(format!("0x{}", &word[word.len() - 40..]).into())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_selector_matches_known_value() {
        assert_eq!(selector("transfer(address,uint256)"), "a9059cbb");
    }

    #[test]
    fn test_namehash_known_vectors() {
        assert_eq!(hex::encode(namehash("")), "0".repeat(64));
        assert_eq!(
            hex::encode(namehash("eth")),
            "93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            hex::encode(namehash("foo.eth")),
            "de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
    }

    #[test]
    fn test_encode_address_pads_left() {
        let encoded = encode(&[Token::Address(
            "0x5b1869d9a4c187f2eaa108f3062412ecf0526b24".into(),
        )])
        .unwrap();
        assert_eq!(
            encoded,
            "0000000000000000000000005b1869d9a4c187f2eaa108f3062412ecf0526b24"
        );
    }

    #[test]
    fn test_encode_uint() {
        let encoded = encode(&[Token::Uint(1), Token::Uint(256)]).unwrap();
        assert_eq!(encoded.len(), 128);
        assert!(encoded.starts_with(&"0".repeat(63)));
        assert!(encoded.ends_with("0100"));
    }

    #[test]
    fn test_encode_dynamic_bytes() {
        let encoded = encode(&[Token::Uint(7), Token::Bytes(b"dat".to_vec())]).unwrap();
        // head: uint word, offset word (0x40); tail: length word, padded data
        assert_eq!(encoded.len(), 4 * 64);
        assert_eq!(&encoded[64..128], &format!("{:0>64}", "40"));
        assert_eq!(&encoded[128..192], &format!("{:0>64}", "3"));
        assert!(encoded[192..].starts_with("646174"));
    }

    #[test]
    fn test_encode_string_matches_bytes_layout() {
        let as_string = encode(&[Token::Str("ipfs:Qm".into())]).unwrap();
        let as_bytes = encode(&[Token::Bytes(b"ipfs:Qm".to_vec())]).unwrap();
        assert_eq!(as_string, as_bytes);
    }

    #[test]
    fn test_encode_rejects_malformed_address() {
        assert!(encode(&[Token::Address("0xnothex".into())]).is_err());
        assert!(encode(&[Token::Address("0x1234".into())]).is_err());
    }

    #[test]
    fn test_decode_hex_rejects_bad_input() {
        assert!(decode_hex("0g").is_err());
        assert!(decode_hex("123").is_err());
        assert_eq!(decode_hex("00ff").unwrap(), vec![0u8, 255u8]);
    }

    #[test]
    fn test_address_from_word() {
        let address = address_from_word(
            "0x0000000000000000000000005b1869d9a4c187f2eaa108f3062412ecf0526b24",
        )
        .unwrap();
        assert_eq!(
            address.as_ref(),
            "0x5b1869d9a4c187f2eaa108f3062412ecf0526b24"
        );
    }

    #[test]
    fn test_bytes32_from_hex_rejects_short_values() {
        assert!(Token::bytes32_from_hex("0x1234").is_err());
    }
}
