//! Text/binary sniffing for the context assembler. Generalizes the
//! teacher's extension-allowlist `is_text_file` (`state.rs`) into the
//! content-based heuristic the design requires: no embedded editor can
//! guess every extension a project will contain, so the assembler sniffs
//! bytes instead of trusting a filename.

const SAMPLE_SIZE: usize = 1024;

/// A file's bytes are text iff: non-empty implies no NUL byte, the bytes
/// are valid UTF-8, and within the first 1024 bytes the count of control
/// codes other than tab/LF/CR is at most 5% of the sampled length.
pub fn is_probably_text(bytes: &[u8]) -> bool {
    if !bytes.is_empty() && bytes.contains(&0) {
        return false;
    }

    if std::str::from_utf8(bytes).is_err() {
        return false;
    }

    let sample = &bytes[..bytes.len().min(SAMPLE_SIZE)];
    if sample.is_empty() {
        return true;
    }

    let control_count = sample
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
        .count();

    (control_count as f64) <= 0.05 * (sample.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_text() {
        assert!(is_probably_text(&[]));
    }

    #[test]
    fn plain_utf8_is_text() {
        assert!(is_probably_text("hello\nworld\n".as_bytes()));
    }

    #[test]
    fn nul_byte_is_binary() {
        assert!(!is_probably_text(&[0x00, 0xFF, 0x00]));
    }

    #[test]
    fn invalid_utf8_is_binary() {
        assert!(!is_probably_text(&[0xFF, 0xFE, 0x00, 0x01]));
    }

    #[test]
    fn sparse_control_chars_within_tolerance_are_text() {
        let mut bytes = vec![b'a'; 100];
        bytes[50] = 0x01; // one control byte among 100 -> 1% <= 5%
        assert!(is_probably_text(&bytes));
    }

    #[test]
    fn dense_control_chars_exceed_tolerance() {
        let mut bytes = vec![b'a'; 100];
        for b in bytes.iter_mut().take(10) {
            *b = 0x01;
        }
        assert!(!is_probably_text(&bytes));
    }
}
