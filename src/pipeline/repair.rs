//! Encoding repair: undo font-encoding and ligature damage in extracted text.
//!
//! PDFs produced by broken font subsetting frequently map ligature glyphs to
//! arbitrary code points: presentation forms (`ﬁ`), Private-Use-Area slots
//! (`U+F001`), or plain ASCII punctuation (`introduc3on`, `a=ention`). This
//! module applies five pure passes in a fixed order; each feeds the next.
//!
//! 1. Explicit ligature / PUA map, plus NUL removal
//! 2. NFKC compatibility normalisation
//! 3. `3`, `$`, `;` → `ti` when flanked by ASCII letters on both sides
//! 4. `=`, `,` → `tt` when flanked by ASCII letters on both sides
//! 5. Strip ASCII control characters except tab, line feed, carriage return
//!
//! The flanking rule is what separates `introduc3on` from `3 items` or
//! `x = y`. The character sets are deliberately narrow; widening them changes
//! observable output.

use unicode_normalization::UnicodeNormalization;

/// Known-bad code points and the letters they stand for.
///
/// `U+FB00..=U+FB06` are the Unicode Latin ligature presentation forms.
/// `U+F001..=U+F004` are the Private-Use slots that Apple/Adobe legacy
/// encodings (and subsetters copying them) assign to the same ligatures.
const LIGATURE_MAP: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
    ('\u{F001}', "fi"),
    ('\u{F002}', "fl"),
    ('\u{F003}', "ffi"),
    ('\u{F004}', "ffl"),
];

/// Upper bound on full-pipeline rounds; see [`repair`].
const MAX_ROUNDS: usize = 4;

/// Apply every repair pass, in order, until the text stops changing.
///
/// A single round is not always a fixed point: stripping a control character
/// in pass 5 can bring a suspect character next to a letter, or a base letter
/// next to a combining mark. Re-running the same ordered passes until nothing
/// changes makes `repair(repair(s)) == repair(s)` hold for every input. In
/// practice the second round is a no-op for text without control characters.
pub fn repair(text: &str) -> String {
    let mut current = repair_round(text);
    for _ in 1..MAX_ROUNDS {
        let next = repair_round(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// One pass over the fixed five-stage order.
fn repair_round(text: &str) -> String {
    let s = replace_ligatures(text);
    let s = normalise_compatibility(&s);
    let s = repair_ti_artifacts(&s);
    let s = repair_tt_artifacts(&s);
    strip_control_chars(&s)
}

// ── Pass 1: Explicit ligature / PUA map ──────────────────────────────────────

fn replace_ligatures(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '\0' {
            continue;
        }
        match LIGATURE_MAP.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

// ── Pass 2: NFKC ─────────────────────────────────────────────────────────────

fn normalise_compatibility(input: &str) -> String {
    input.nfkc().collect()
}

// ── Passes 3 & 4: flanked ligature artefacts ─────────────────────────────────

fn repair_ti_artifacts(input: &str) -> String {
    replace_flanked(input, &['3', '$', ';'], "ti")
}

fn repair_tt_artifacts(input: &str) -> String {
    replace_flanked(input, &['=', ','], "tt")
}

/// Replace each character in `suspects` with `replacement` when both of its
/// neighbours in the *input* are ASCII letters.
///
/// Neighbours are read from the original string, never from the output being
/// built, so `a33b` stays untouched exactly like a lookaround regex would.
fn replace_flanked(input: &str, suspects: &[char], replacement: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        let flanked = i > 0
            && i + 1 < chars.len()
            && chars[i - 1].is_ascii_alphabetic()
            && chars[i + 1].is_ascii_alphabetic();
        if flanked && suspects.contains(&c) {
            out.push_str(replacement);
        } else {
            out.push(c);
        }
    }
    out
}

// ── Pass 5: Control characters ───────────────────────────────────────────────

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

fn strip_control_chars(input: &str) -> String {
    input.chars().filter(|&c| !is_stripped_control(c)).collect()
}

/// Count of non-whitespace characters, the measure the OCR trigger uses.
pub fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presentation_form_ligature() {
        assert_eq!(repair("\u{FB01}le"), "file");
        assert_eq!(repair("o\u{FB00}er"), "offer");
        assert_eq!(repair("\u{FB03}ce"), "ffice");
    }

    #[test]
    fn test_pua_ligature() {
        assert_eq!(repair("\u{F001}sh"), "fish");
        assert_eq!(repair("\u{F002}oor"), "floor");
    }

    #[test]
    fn test_ti_artifact_flanked() {
        assert_eq!(repair("introduc3on"), "introduction");
        assert_eq!(repair("na$onal"), "national");
        assert_eq!(repair("rela;ve"), "relative");
    }

    #[test]
    fn test_ti_artifact_not_flanked() {
        assert_eq!(repair("3 items"), "3 items");
        assert_eq!(repair("costs $5"), "costs $5");
        assert_eq!(repair("one; two"), "one; two");
        assert_eq!(repair("abc3"), "abc3");
        assert_eq!(repair("3abc"), "3abc");
    }

    #[test]
    fn test_tt_artifact() {
        assert_eq!(repair("a=ention"), "attention");
        assert_eq!(repair("se,ing"), "setting");
        assert_eq!(repair("x = y"), "x = y");
        assert_eq!(repair("a, b"), "a, b");
    }

    #[test]
    fn test_flank_reads_original_neighbours() {
        assert_eq!(repair_ti_artifacts("a33b"), "a33b");
        assert_eq!(repair_ti_artifacts("a3b3c"), "atibtic");
    }

    #[test]
    fn test_control_chars_stripped_whitespace_kept() {
        assert_eq!(repair("a\tb\nc\r\n"), "a\tb\nc\r\n");
        assert_eq!(repair("a\0b"), "ab");
        assert_eq!(repair("x\u{07}y\u{1B}z\u{7F}"), "xyz");
        assert_eq!(repair("v\u{0B}w\u{0C}"), "vw");
    }

    #[test]
    fn test_nfkc_folds_compatibility_forms() {
        assert_eq!(repair("\u{FF21}BC"), "ABC");
        assert_eq!(repair("x\u{00B2}"), "x2");
    }

    #[test]
    fn test_idempotent_on_tricky_inputs() {
        let samples = [
            "introduc3on to a=ention",
            "a\u{1}3b",
            "e\u{1}\u{301}",
            "\u{FB01}\u{0}le na$onal",
            "plain text, 3 items; x = y",
            "\u{FF1B}a\u{FF1B}b",
            "",
            "\r\n\t",
        ];
        for s in samples {
            let once = repair(s);
            assert_eq!(repair(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_control_strip_exposes_flank_once() {
        // Stripping \u{1} brings 3 between two letters; the fixed point repairs it.
        assert_eq!(repair("a\u{1}3b"), "atib");
    }

    #[test]
    fn test_non_whitespace_len() {
        assert_eq!(non_whitespace_len(" a b\n\tc "), 3);
        assert_eq!(non_whitespace_len("   \n"), 0);
    }
}
