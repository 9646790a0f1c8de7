//! Emoji-only text detection.
//!
//! Works on code points rather than grapheme clusters: a string is accepted
//! when every code point is pictographic or an emoji component (joiners,
//! variation selectors, skin tones, tags, keycaps) and at least one is
//! pictographic. Keycap bases (`0-9`, `#`, `*`) only count when followed by a
//! variation selector or the combining keycap.

const ZERO_WIDTH_JOINER: char = '\u{200D}';
const VARIATION_SELECTOR_15: char = '\u{FE0E}';
const VARIATION_SELECTOR_16: char = '\u{FE0F}';
const COMBINING_KEYCAP: char = '\u{20E3}';

pub fn is_emoji_only(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    let mut saw_pictograph = false;

    while let Some(ch) = chars.next() {
        if is_pictographic(ch) {
            saw_pictograph = true;
            continue;
        }
        if is_component(ch) {
            continue;
        }
        if is_keycap_base(ch) {
            match chars.peek() {
                Some(&next) if next == VARIATION_SELECTOR_16 || next == COMBINING_KEYCAP => {
                    saw_pictograph = true;
                    continue;
                }
                _ => return false,
            }
        }
        return false;
    }

    saw_pictograph
}

fn is_keycap_base(ch: char) -> bool {
    ch.is_ascii_digit() || ch == '#' || ch == '*'
}

fn is_component(ch: char) -> bool {
    matches!(
        ch,
        ZERO_WIDTH_JOINER | VARIATION_SELECTOR_15 | VARIATION_SELECTOR_16 | COMBINING_KEYCAP
    ) || matches!(ch as u32, 0xE0020..=0xE007F)
}

fn is_pictographic(ch: char) -> bool {
    matches!(
        ch as u32,
        0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049
            | 0x2122
            | 0x2139
            | 0x2194..=0x2199
            | 0x21A9..=0x21AA
            | 0x231A..=0x231B
            | 0x2328
            | 0x23CF
            | 0x23E9..=0x23F3
            | 0x23F8..=0x23FA
            | 0x24C2
            | 0x25AA..=0x25AB
            | 0x25B6
            | 0x25C0
            | 0x25FB..=0x25FE
            | 0x2600..=0x27BF
            | 0x2934..=0x2935
            | 0x2B05..=0x2B07
            | 0x2B1B..=0x2B1C
            | 0x2B50
            | 0x2B55
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x1F000..=0x1FAFF
            | 0x1FC00..=0x1FFFD
    )
}
