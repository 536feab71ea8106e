//! Text encoding recovery for uploaded bytes.
//!
//! Candidates are tried in a fixed order and the first one that decodes the whole buffer
//! without a malformed sequence wins. Byte order marks and in-band declarations are not
//! consulted.
//!
//! The GBK decoder accepts every double-byte sequence Big5 does, so `BIG5` never wins in
//! practice: Big5 input decodes without error but as GBK text, not as the original
//! characters.

use std::borrow::Cow;

use encoding_rs::{BIG5, Encoding, GBK, UTF_8, WINDOWS_1252};

/// Probe order. `BIG5` is shadowed by `GBK`. The last entry is single-byte and accepts
/// every input.
pub const CANDIDATES: [&Encoding; 4] = [UTF_8, GBK, BIG5, WINDOWS_1252];

/// Decode `bytes` with the first candidate encoding that accepts all of them.
///
/// Never fails: the single-byte fallback maps every byte to a character.
pub fn resolve(bytes: &[u8]) -> (Cow<'_, str>, &'static Encoding) {
    for encoding in CANDIDATES {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return (text, encoding);
        }
    }

    let fallback = WINDOWS_1252;
    let (text, _had_errors) = fallback.decode_without_bom_handling(bytes);
    (text, fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_wins_when_valid() {
        let (text, enc) = resolve("名字,分数\n".as_bytes());
        assert_eq!(enc, UTF_8);
        assert_eq!(text, "名字,分数\n");
    }

    #[test]
    fn big5_bytes_are_claimed_by_gbk() {
        let (bytes, _, _) = BIG5.encode("臺灣繁體中文測試資料");
        let (text, enc) = resolve(&bytes);
        assert_eq!(enc, GBK);
        assert_ne!(text, "臺灣繁體中文測試資料");
    }

    #[test]
    fn gbk_bytes_fall_through_to_gbk() {
        let (bytes, _, _) = GBK.encode("姓名,城市\n张三,北京\n");
        assert!(std::str::from_utf8(&bytes).is_err());

        let (text, enc) = resolve(&bytes);
        assert_eq!(enc, GBK);
        assert_eq!(text, "姓名,城市\n张三,北京\n");
    }

    #[test]
    fn single_byte_fallback_preserves_length() {
        // 0x80 alone is invalid UTF-8, and a trailing lead byte is invalid in GBK/Big5.
        let bytes = [b'a', 0xE9, b'b', 0x81];
        let (text, enc) = resolve(&bytes);
        assert_eq!(enc, WINDOWS_1252);
        assert_eq!(text.chars().count(), bytes.len());
        assert!(text.starts_with("aéb"));
    }

    #[test]
    fn empty_input_is_utf8() {
        let (text, enc) = resolve(b"");
        assert_eq!(enc, UTF_8);
        assert!(text.is_empty());
    }
}
