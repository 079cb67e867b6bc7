/// Glyphs that hospital exports use as emphasis or field markers.
const MARKER_GLYPHS: &[char] = &['*', '^'];

/// Normalize text for downstream consumption.
///
/// Removes marker glyphs, control characters and invisible Unicode, collapses
/// every whitespace run, and trims the ends. A run without a line break becomes
/// one space, a run with one line break becomes `\n`, and a run spanning blank
/// lines becomes exactly one blank line. Idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut pending_newlines = 0usize;

    for c in text.chars().filter(|c| is_kept(*c)) {
        if c.is_whitespace() {
            if c == '\n' {
                pending_newlines += 1;
            } else {
                pending_space = true;
            }
            continue;
        }

        if !out.is_empty() {
            match pending_newlines {
                0 if pending_space => out.push(' '),
                0 => {}
                1 => out.push('\n'),
                _ => out.push_str("\n\n"),
            }
        }
        pending_space = false;
        pending_newlines = 0;
        out.push(c);
    }

    out
}

fn is_kept(c: char) -> bool {
    if MARKER_GLYPHS.contains(&c) || is_invisible(c) {
        return false;
    }
    // Whitespace controls (\t, \n, \r, VT, FF) are folded by the collapse step.
    !c.is_control() || c.is_whitespace()
}

/// Zero-width and directional formatting characters.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}'  // Zero-width chars
        | '\u{202A}'..='\u{202E}' // Directional formatting
        | '\u{2060}'..='\u{2064}' // Invisible operators
        | '\u{2066}'..='\u{2069}' // Directional isolates
        | '\u{FEFF}'              // BOM
        | '\u{00AD}'              // Soft hyphen
    )
}
