use crate::ConvertError;
use crate::Result;

/// The first eight bytes of the BLAKE3 digest of `s`, little-endian.
///
/// The value only depends on the input, never on the toolchain or the
/// process, so it can be persisted.
pub fn str_to_u64(s: &str) -> u64 {
    let digest = blake3::hash(s.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Converts a `u64` to an 8-byte array in big-endian byte order.
///
/// Big-endian keeps the byte order of encoded keys identical to the numeric
/// order, which the sled-backed maps rely on for range scans.
///
/// # Examples
/// ```
/// use scavenge_engine::convert::safe_kv;
///
/// let bytes = safe_kv(0x1234_5678_9ABC_DEF0);
/// assert_eq!(bytes, [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);
/// ```
pub const fn safe_kv(num: u64) -> [u8; 8] {
    num.to_be_bytes()
}

pub fn safe_vk<K: AsRef<[u8]>>(bytes: K) -> Result<u64> {
    let bytes = bytes.as_ref();
    let array: [u8; 8] = bytes.try_into().map_err(|_| ConvertError::InvalidLength {
        expected: 8,
        actual: bytes.len(),
    })?;
    Ok(u64::from_be_bytes(array))
}

/// 32-bit counterpart of [`safe_kv`], used for logical chunk numbers.
pub const fn safe_kv32(num: u32) -> [u8; 4] {
    num.to_be_bytes()
}

pub fn safe_vk32<K: AsRef<[u8]>>(bytes: K) -> Result<u32> {
    let bytes = bytes.as_ref();
    let array: [u8; 4] = bytes.try_into().map_err(|_| ConvertError::InvalidLength {
        expected: 4,
        actual: bytes.len(),
    })?;
    Ok(u32::from_be_bytes(array))
}

pub fn bytes_to_string(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ConvertError::ConversionFailure(e.to_string()).into())
}

/// Prepends a one byte namespace to an encoded key.
pub fn prefixed_key(
    prefix: u8,
    key: &[u8],
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(key.len() + 1);
    bytes.push(prefix);
    bytes.extend_from_slice(key);
    bytes
}
