//! The binary image format: a bare stream of big-endian 64-bit words with no
//! header, length prefix, or checksum.

use std::io::{self, Write};

use crate::Word;

/// Decodes an image from raw bytes. The buffer is consumed in 8-byte chunks;
/// a trailing partial word is ignored.
pub fn decode(bytes: &[u8]) -> Vec<Word> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            Word::from_be_bytes(word)
        })
        .collect()
}

/// Encodes an image to `out`, emitting exactly `8 * words.len()` bytes.
pub fn encode<W: Write>(words: &[Word], mut out: W) -> io::Result<()> {
    for word in words {
        out.write_all(&word.to_be_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_big_endian() {
        let mut buf = Vec::new();
        encode(&[1, 0x0102030405060708], &mut buf).unwrap();
        assert_eq!(
            vec![0, 0, 0, 0, 0, 0, 0, 1, 1, 2, 3, 4, 5, 6, 7, 8],
            buf
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let words = vec![0, 1, 42, Word::max_value()];
        let mut buf = Vec::new();
        encode(&words, &mut buf).unwrap();
        assert_eq!(words, decode(&buf));
    }

    #[test]
    fn test_decode_ignores_short_tail() {
        let mut bytes = vec![0, 0, 0, 0, 0, 0, 0, 7];
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(vec![7], decode(&bytes));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(Vec::<Word>::new(), decode(&[]));
    }
}
