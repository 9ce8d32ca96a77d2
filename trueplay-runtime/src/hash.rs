//! BLAKE2 digests and SS58 address encoding

use crate::error::SdkError;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};

/// BLAKE2b with a 256-bit output
pub type Blake2b256 = Blake2b<U32>;

/// Address prefix of True Network
pub const TRUE_NETWORK_PREFIX: u16 = 7;

const SS58_CONTEXT: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;

pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn bytes_to_blake_two_256_hash(bytes: &[u8]) -> String {
    to_hex(&blake2_256(bytes))
}

pub fn string_to_blake_two_256_hash(text: &str) -> String {
    bytes_to_blake_two_256_hash(text.as_bytes())
}

/// Parse `0x` + 64 hex digits
pub fn parse_hash(text: &str) -> Option<[u8; 32]> {
    let digits = text.strip_prefix("0x")?;
    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out).ok()?;
    Some(out)
}

fn ss58_checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CONTEXT);
    hasher.update(payload);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

fn encode_prefix(prefix: u16) -> Vec<u8> {
    if prefix < 64 {
        vec![prefix as u8]
    } else {
        vec![
            (((prefix & 0b1111_1100) >> 2) as u8) | 0b0100_0000,
            ((prefix >> 8) as u8) | (((prefix & 0b11) as u8) << 6),
        ]
    }
}

/// Encode a 32-byte account id with the given network prefix
pub fn ss58_encode(account: &[u8; 32], prefix: u16) -> String {
    let mut payload = encode_prefix(prefix);
    payload.extend_from_slice(account);
    let checksum = ss58_checksum(&payload);
    payload.extend_from_slice(&checksum);
    bs58::encode(payload).into_string()
}

/// Decode an SS58 address into its prefix and 32-byte account id
pub fn ss58_decode(address: &str) -> Result<(u16, [u8; 32]), SdkError> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|err| SdkError::invalid_address(address, err.to_string()))?;

    let (prefix, prefix_len) = match data.first() {
        Some(&first) if first < 64 => (u16::from(first), 1),
        Some(&first) if first < 128 && data.len() > 1 => {
            let second = data[1];
            let lower = (first << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            (u16::from(lower) | (u16::from(upper) << 8), 2)
        }
        _ => return Err(SdkError::invalid_address(address, "unknown address prefix")),
    };

    if data.len() != prefix_len + 32 + CHECKSUM_LEN {
        return Err(SdkError::invalid_address(
            address,
            format!("expected a 32-byte account, got {} bytes", data.len()),
        ));
    }

    let (payload, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    if ss58_checksum(payload) != checksum {
        return Err(SdkError::invalid_address(address, "checksum mismatch"));
    }

    let mut account = [0u8; 32];
    account.copy_from_slice(&payload[prefix_len..]);
    Ok((prefix, account))
}

/// Re-encode `address` for the network with `prefix`.
///
/// Accepts any SS58 address or a `0x`-prefixed 32-byte public key.
pub fn to_network_address(address: &str, prefix: u16) -> Result<String, SdkError> {
    let trimmed = address.trim();
    let account = if trimmed.starts_with("0x") {
        parse_hash(trimmed).ok_or_else(|| SdkError::invalid_address(address, "expected 32 bytes of hex"))?
    } else {
        ss58_decode(trimmed)?.1
    };
    Ok(ss58_encode(&account, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_GENERIC: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const ALICE_TRUE: &str = "nJrsrH8dov9Z36kTDpabgCZT8CbK1FbmjJvfU6qbMTG4g4c";

    #[test]
    fn test_blake2_256_vectors() {
        assert_eq!(
            string_to_blake_two_256_hash("hello"),
            "0x324dcf027dd4a30a932c441f365a25e86b173defa4b8e58948253471b81b72cf"
        );
        assert_eq!(
            bytes_to_blake_two_256_hash(&[1, 2, 3]),
            "0x11c0e79b71c3976ccd0c02d1310e2516c08edc9d8b6f57ccd680d63a4d8e72da"
        );
    }

    #[test]
    fn test_reencode_to_true_network() {
        assert_eq!(to_network_address(ALICE_GENERIC, TRUE_NETWORK_PREFIX).unwrap(), ALICE_TRUE);
        assert_eq!(to_network_address(ALICE_TRUE, 42).unwrap(), ALICE_GENERIC);

        let (prefix, account) = ss58_decode(ALICE_TRUE).unwrap();
        assert_eq!(prefix, TRUE_NETWORK_PREFIX);
        assert_eq!(
            hex::encode(account),
            "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d"
        );
    }

    #[test]
    fn test_public_key_input() {
        let key = "0xd43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";
        assert_eq!(to_network_address(key, TRUE_NETWORK_PREFIX).unwrap(), ALICE_TRUE);
    }

    #[test]
    fn test_two_byte_prefix_roundtrip() {
        let account = [7u8; 32];
        let address = ss58_encode(&account, 1284);
        assert_eq!(ss58_decode(&address).unwrap(), (1284, account));
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let mut tampered = ALICE_TRUE.to_string();
        tampered.pop();
        tampered.push('d');
        let err = ss58_decode(&tampered).unwrap_err();
        assert!(matches!(err, SdkError::InvalidAddress { .. }));
        assert!(to_network_address("0x1234", 7).is_err());
    }
}
