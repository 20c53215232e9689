use sha2::{Digest, Sha256};

/// Fingerprint of an import's source text: SHA-256 over its exact UTF-8
/// bytes, lowercase hex. No trimming or newline folding, so a re-pasted
/// reply only matches when it is byte-identical.
pub fn source_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASTE: &str = "Here is the plan:\n```json\n{\"members\":[{\"name\":\"Ann\",\"projects\":[]}]}\n```\n";

    #[test]
    fn chat_paste_digest_is_stable() {
        assert_eq!(
            source_digest(PASTE),
            "393698223888d920902707d6ded493148ca1b100b26e94edd0c0352bf829837c"
        );
    }

    #[test]
    fn whitespace_and_line_endings_count() {
        let digest = source_digest(PASTE);
        assert_ne!(digest, source_digest(PASTE.trim_end()));
        assert_ne!(digest, source_digest(&PASTE.replace('\n', "\r\n")));
    }

    #[test]
    fn non_ascii_text_hashes_its_utf8_bytes() {
        assert_eq!(
            source_digest("計畫 ✓"),
            "58e07ba8515f71400699df505d14e0ddfa872a98b3371dc80bb522291dd5a394"
        );
    }
}
