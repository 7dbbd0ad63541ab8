/// Sum of all bytes, wrapping at 16 bit. Used by rdm packages and discovery responses alike.
#[inline]
pub fn calculate_checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |checksum, byte| checksum.wrapping_add(*byte as u16))
}

/// Spread every byte over two bytes (`byte | 0xAA`, `byte | 0x55`) as discovery responses do.
/// The destination has to be at least twice the source size.
pub(crate) fn encode_disc_unique(src: &[u8], dest: &mut [u8]) {
    for (byte, pair) in src.iter().zip(dest.chunks_exact_mut(2)) {
        pair[0] = byte | 0xAA;
        pair[1] = byte | 0x55;
    }
}

/// Fold byte pairs back into single bytes by AND-ing them.
/// The destination has to be at least half the source size.
pub(crate) fn decode_disc_unique(src: &[u8], dest: &mut [u8]) {
    for (byte, pair) in dest.iter_mut().zip(src.chunks_exact(2)) {
        *byte = pair[0] & pair[1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(calculate_checksum(&[]), 0);
        assert_eq!(calculate_checksum(&[0xFF, 0x01]), 0x0100);
        assert_eq!(calculate_checksum(&[0xFF; 258]), 0xFFu16.wrapping_mul(258));
    }

    #[test]
    fn test_disc_unique_pairs() {
        let mut encoded = [0u8; 4];
        encode_disc_unique(&[0x12, 0xF0], &mut encoded);
        assert_eq!(encoded, [0xBA, 0x57, 0xFA, 0xF5]);

        let mut decoded = [0u8; 2];
        decode_disc_unique(&encoded, &mut decoded);
        assert_eq!(decoded, [0x12, 0xF0]);
    }
}
