use super::rules::apply_rules;
use crate::pipeline::patterns::han_only;

/// Han-character title of a colon-delimited line, plus the delimiter's byte offset.
///
/// The earliest of `：` and `:` splits the line; non-Han characters are
/// stripped from the prefix. `None` for lines without a colon.
pub fn section_title(line: &str) -> Option<(String, usize)> {
    let at = line.find(['：', ':'])?;
    Some((han_only(&line[..at]), at))
}

/// Keep the lines of a document that do not belong to excluded sections.
///
/// A titled line whose title contains any exclusion string is dropped along
/// with the colon-less lines that follow it, up to the next titled line.
/// Retained titled lines are trimmed by the sub-section rules. Order is
/// preserved and nothing else is rewritten.
pub fn extract<S: AsRef<str>>(lines: &[S], exclusions: &[String]) -> Vec<String> {
    let mut retained = Vec::with_capacity(lines.len());
    let mut allow = true;
    let mut dropped = 0usize;

    for line in lines {
        let line = line.as_ref();
        let Some((title, _)) = section_title(line) else {
            if allow {
                retained.push(line.to_string());
            } else {
                dropped += 1;
            }
            continue;
        };

        allow = !is_excluded(&title, exclusions);
        let trimmed = apply_rules(&title, line);

        let keep = if trimmed.rescued {
            // A rescued span carries its own title; that title is checked too.
            !section_title(&trimmed.line).is_some_and(|(own, _)| is_excluded(&own, exclusions))
        } else {
            allow
        };

        if keep {
            retained.push(trimmed.line);
        } else {
            dropped += 1;
        }
    }

    tracing::debug!(
        retained = retained.len(),
        dropped,
        "Section extraction complete"
    );

    retained
}

/// [`extract`] over the lines of `text`, rejoined with `\n`.
pub fn extract_text(text: &str, exclusions: &[String]) -> String {
    let lines: Vec<&str> = text.lines().collect();
    extract(&lines, exclusions).join("\n")
}

fn is_excluded(title: &str, exclusions: &[String]) -> bool {
    exclusions
        .iter()
        .any(|ex| !ex.is_empty() && title.contains(ex.as_str()))
}
