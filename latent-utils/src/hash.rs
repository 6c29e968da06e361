/// 32 byte seed derived from an arbitrary string.
pub fn u8s_from_str(input: &str) -> [u8; 32] {
    blake3::hash(input.as_bytes()).into()
}
