/// Canonical text form used by keyword matching: lowercase, Devanagari digits
/// mapped to ASCII, everything outside `[a-z0-9 ]` treated as a separator,
/// whitespace collapsed.
pub(crate) fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|ch| match ch {
            '\u{0966}'..='\u{096F}' => {
                let offset = (ch as u32 - 0x0966) as u8;
                (b'0' + offset) as char
            }
            'a'..='z' | '0'..='9' => ch,
            _ => ' ',
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::normalize_text;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(
            normalize_text("  The   Mitochondria\tIS the  powerhouse "),
            "the mitochondria is the powerhouse"
        );
    }

    #[test]
    fn maps_devanagari_digits_to_ascii() {
        assert_eq!(normalize_text("कक्षा १० के छात्र"), "10");
    }

    #[test]
    fn strips_punctuation_to_separators() {
        assert_eq!(normalize_text("photo-synthesis, (in leaves)!"), "photo synthesis in leaves");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   \n\t"), "");
    }
}
