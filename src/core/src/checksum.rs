//! CRC-32 (ISO-HDLC) as embedded in ZIP local and central headers.

/// Reflected form of the 0x04C11DB7 generator polynomial.
const POLYNOMIAL: u32 = 0xEDB8_8320;

/// Computes the CRC-32 of `data`, bit by bit.
///
/// Initial value and final XOR are both `0xFFFF_FFFF`, so the empty input
/// yields `0`.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = u32::MAX;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (POLYNOMIAL & mask);
        }
    }
    !crc
}
