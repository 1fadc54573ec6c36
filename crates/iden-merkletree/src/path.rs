//! Bit addressing for tree paths and proof bitmaps.
//!
//! Bit `n` of a byte array is bit `n % 8` of byte `len - 1 - n / 8`, so bit 0
//! is the least significant bit of the last byte.

pub fn test_bit(bitmap: &[u8], n: usize) -> bool {
    bitmap[bitmap.len() - 1 - n / 8] & (1 << (n % 8)) != 0
}

pub fn set_bit(bitmap: &mut [u8], n: usize) {
    let len = bitmap.len();
    bitmap[len - 1 - n / 8] |= 1 << (n % 8);
}

/// Direction at every level from the root: `true` descends right.
pub fn get_path(num_levels: usize, key: &[u8]) -> Vec<bool> {
    (0..num_levels).map(|n| test_bit(key, n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_addressing_starts_at_tail() {
        let mut bitmap = [0u8; 4];
        set_bit(&mut bitmap, 0);
        assert_eq!(bitmap, [0, 0, 0, 0b0000_0001]);
        set_bit(&mut bitmap, 9);
        assert_eq!(bitmap, [0, 0, 0b0000_0010, 0b0000_0001]);
        assert!(test_bit(&bitmap, 0));
        assert!(test_bit(&bitmap, 9));
        assert!(!test_bit(&bitmap, 8));
    }

    #[test]
    fn test_path_of_small_key() {
        let mut key = [0u8; 32];
        key[31] = 0b0000_0101;
        let path = get_path(4, &key);
        assert_eq!(path, vec![true, false, true, false]);
    }
}
