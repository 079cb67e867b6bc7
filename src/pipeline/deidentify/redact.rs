use std::sync::LazyLock;

use regex::Regex;

use super::registry::NameRegistry;
use crate::pipeline::patterns::{
    columns_to_lines, is_chinese_name, is_date_line, is_section_title, labelled_names,
    strip_privacy_headers,
};

/// Internal stand-in for a removed name or date. Private-use, never in source text.
const PLACEHOLDER: &str = "\u{E000}";

/// Separator used when a date line is folded into the title line below it.
const TITLE_JOIN: &str = "    ";

static HORIZONTAL_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static LEADING_LINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s+").unwrap());
static TRAILING_LINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\n").unwrap());
static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Heuristic name/date redaction for one patient's documents.
#[derive(Debug, Clone, Default)]
pub struct Deidentifier {
    redaction_token: Option<String>,
}

/// Result of the line pass over one document.
struct LineScan {
    lines: Vec<String>,
    names: Vec<String>,
    dates: usize,
}

impl Deidentifier {
    /// Placeholders are deleted from the output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholders are replaced with `token` instead of being deleted.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            redaction_token: Some(token.into()),
        }
    }

    /// First pass: register every name this document reveals without redacting.
    /// Returns how many names were new to the registry.
    pub fn observe(&self, text: &str, registry: &mut NameRegistry) -> usize {
        let before = registry.len();
        registry.extend(labelled_names(text));
        registry.extend(scan_lines(text).names);
        registry.len() - before
    }

    /// Redact `text` with every name in `registry` plus any this document reveals.
    ///
    /// Returns the cleaned text and the updated registry. Names learned here are
    /// not applied retroactively to documents already redacted; call
    /// [`observe`](Self::observe) on all of a patient's documents first.
    pub fn redact(&self, text: &str, mut registry: NameRegistry) -> (String, NameRegistry) {
        registry.extend(labelled_names(text));
        let scan = scan_lines(text);
        registry.extend(scan.names);

        let mut content = scan.lines.join("\n");
        for name in registry.longest_first() {
            content = content.replace(name, PLACEHOLDER);
        }

        let token = self.redaction_token.as_deref().unwrap_or("");
        let content = content.replace(PLACEHOLDER, token);

        tracing::debug!(
            registry_size = registry.len(),
            dates_removed = scan.dates,
            "De-identification pass complete"
        );

        (tidy_whitespace(&content), registry)
    }
}

/// Strip headers, split columns into lines and classify each line.
fn scan_lines(text: &str) -> LineScan {
    let text = columns_to_lines(&strip_privacy_headers(text));
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

    let mut out = Vec::with_capacity(lines.len());
    let mut names = Vec::new();
    let mut dates = 0;

    for i in 0..lines.len() {
        let stripped = lines[i].trim();
        if stripped.is_empty() {
            continue;
        }

        if is_date_line(stripped) {
            let merged = match lines.get(i + 1) {
                Some(next) if is_section_title(next.trim()) => {
                    Some(format!("{}{}{}", lines[i], TITLE_JOIN, next.trim()))
                }
                _ => None,
            };
            match merged {
                Some(title_line) => lines[i + 1] = title_line,
                None => {
                    dates += 1;
                    out.push(PLACEHOLDER.to_string());
                }
            }
        } else if is_chinese_name(stripped) {
            names.push(stripped.to_string());
            out.push(PLACEHOLDER.to_string());
        } else {
            out.push(lines[i].clone());
        }
    }

    LineScan {
        lines: out,
        names,
        dates,
    }
}

/// Collapse spacing left behind by removed placeholders.
fn tidy_whitespace(text: &str) -> String {
    let text = HORIZONTAL_RUN.replace_all(text, " ");
    let text = LEADING_LINE_SPACE.replace_all(&text, "\n");
    let text = TRAILING_LINE_SPACE.replace_all(&text, "\n");
    let text = NEWLINE_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redact_with(names: &[&str], text: &str) -> (String, NameRegistry) {
        let registry: NameRegistry = names.iter().copied().collect();
        Deidentifier::new().redact(text, registry)
    }

    #[test]
    fn removes_registered_name_inside_sentence() {
        let (clean, _) = redact_with(&["张三"], "责任医生张三于2022-07-09查房");
        assert_eq!(clean, "责任医生于2022-07-09查房");
    }

    #[test]
    fn name_line_is_registered_and_removed_everywhere() {
        let text = "主诉：右膝疼痛3天\n李四\n责任医生：李四查房记录";
        let (clean, registry) = redact_with(&[], text);
        assert!(registry.contains("李四"));
        assert!(!clean.contains("李四"));
        assert!(clean.contains("主诉：右膝疼痛3天"));
        assert!(clean.contains("责任医生：查房记录"));
    }

    #[test]
    fn bare_date_line_is_removed() {
        let (clean, _) = redact_with(&[], "病情稳定\n2022-07-09 09:12\n继续治疗");
        assert_eq!(clean, "病情稳定\n继续治疗");
    }

    #[test]
    fn date_line_followed_by_title_is_merged() {
        let text = "2022-07-09 09:12\n主治医师查房记录\n患者诉右膝疼痛减轻";
        let (clean, _) = redact_with(&[], text);
        assert_eq!(clean, "2022-07-09 09:12 主治医师查房记录\n患者诉右膝疼痛减轻");
    }

    #[test]
    fn column_layout_is_split_before_classification() {
        let text = "病情稳定，继续观察。    王五\n";
        let (clean, registry) = redact_with(&[], text);
        assert!(registry.contains("王五"));
        assert_eq!(clean, "病情稳定，继续观察。");
    }

    #[test]
    fn labelled_signature_names_are_harvested() {
        let text = "出院医嘱：门诊随访\n医师签名：赵六 \n赵六已告知患者";
        let (clean, registry) = redact_with(&[], text);
        assert!(registry.contains("赵六"));
        assert!(!clean.contains("赵六"));
        assert!(clean.contains("已告知患者"));
    }

    #[test]
    fn privacy_header_is_dropped() {
        let text = "患者姓名：孙七 性别：男 住院天数：10\n入院情况：一般情况可";
        let (clean, _) = redact_with(&[], text);
        assert_eq!(clean, "入院情况：一般情况可");
    }

    #[test]
    fn longer_names_replaced_before_prefixes() {
        let (clean, _) = redact_with(&["张三", "张三丰"], "会诊医师张三丰，主管医师张三");
        assert_eq!(clean, "会诊医师，主管医师");
    }

    #[test]
    fn redaction_token_keeps_an_audit_marker() {
        let registry: NameRegistry = ["张三"].into_iter().collect();
        let (clean, _) = Deidentifier::with_token("[NAME]").redact("责任医生张三查房", registry);
        assert_eq!(clean, "责任医生[NAME]查房");
    }

    #[test]
    fn observe_does_not_need_redaction() {
        let mut registry = NameRegistry::new();
        let added = Deidentifier::new().observe("钱八\n主诉：无\n姓名：孙七\n", &mut registry);
        assert_eq!(added, 2);
        assert!(registry.contains("钱八"));
        assert!(registry.contains("孙七"));
    }

    #[test]
    fn collapses_blank_lines_left_by_removals() {
        let text = "主诉：无\n\n\n张三\n\n\n\n现病史：无";
        let (clean, _) = redact_with(&[], text);
        assert_eq!(clean, "主诉：无\n现病史：无");
    }
}
