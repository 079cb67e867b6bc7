//! Regex matchers shared by the normalization stages.
//!
//! Everything here is stateless: names, section titles, date stamps,
//! privacy header blocks and labelled signature fields.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Whole-line personal name: 2–3 common Han characters.
static NAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\x{4e00}-\x{9fa5}]{2,3}$").unwrap());

static HAN_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\x{4e00}-\x{9fa5}]+$").unwrap());

static HAN_WITH_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\x{4e00}-\x{9fa5}，、.（）]+$").unwrap());

/// Date, optionally followed by `HH:MM`, alone on a line.
static DATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}[-./年][0-9]{1,2}[-./月][0-9]{1,2}(?:日)?(?: [0-9]{1,2}:[0-9]{2})?$")
        .unwrap()
});

/// Admission-record header: `姓名：` through the `发病节气：` field and its blank line.
static ADMISSION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)姓\s*名：.*?发病节气：.*?\n\n").unwrap());

/// Discharge-record header: `患者姓名:` through the `住院天数:` line.
static DISCHARGE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)患者姓名[:：].*?住院天数[:：].*?\n").unwrap());

/// `姓名：X` / `签名：X` label fields.
static LABELLED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[姓签]\s*名：\s*([^ \n]+)[ \n]").unwrap());

/// Fixed-width column gap: four or more horizontal whitespace characters.
static COLUMN_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]{4,}").unwrap());

static HYPHENATED_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2})").unwrap()
});

/// Dotted stamps only count when a record title follows on the same line.
static DOTTED_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{4}\.[0-9]{2}\.[0-9]{2} [0-9]{2}:[0-9]{2}) .+").unwrap()
});

/// Keywords a record title line must carry.
const TITLE_KEYWORDS: &[&str] = &["记录", "查房", "术"];

/// Progress-note timestamp layout. A document uses exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// `2022-07-09 09:12`
    #[default]
    Hyphenated,
    /// `2021.10.10 08:11 主治医师查房记录`
    Dotted,
}

impl TimestampFormat {
    /// Pattern whose first capture group is the bare timestamp.
    pub fn regex(&self) -> &'static Regex {
        match self {
            Self::Hyphenated => &*HYPHENATED_STAMP,
            Self::Dotted => &*DOTTED_STAMP,
        }
    }

    fn chrono_layout(&self) -> &'static str {
        match self {
            Self::Hyphenated => "%Y-%m-%d %H:%M",
            Self::Dotted => "%Y.%m.%d %H:%M",
        }
    }

    /// Parse a captured timestamp. Out-of-range values (month 13) yield `None`.
    pub fn parse(&self, stamp: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(stamp, self.chrono_layout()).ok()
    }
}

/// CJK unified ideograph in the range used for titles.
///
/// Wider than the `4e00..=9fa5` range of the name and title-line regexes,
/// so title text keeps the later-added ideographs those lines reject.
pub fn is_han(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

pub fn is_chinese_name(line: &str) -> bool {
    NAME_LINE.is_match(line)
}

pub fn is_date_line(line: &str) -> bool {
    DATE_LINE.is_match(line)
}

/// Short record-title line such as `主治医师查房记录` or `术后第一天记录（补）`.
pub fn is_section_title(line: &str) -> bool {
    if !TITLE_KEYWORDS.iter().any(|k| line.contains(k)) {
        return false;
    }
    let len = line.chars().count();
    if HAN_ONLY.is_match(line) {
        (4..=15).contains(&len)
    } else if HAN_WITH_PUNCT.is_match(line) {
        (4..=20).contains(&len)
    } else {
        false
    }
}

/// Remove the fixed privacy header blocks. Unterminated headers are left alone.
pub fn strip_privacy_headers(text: &str) -> String {
    let text = ADMISSION_HEADER.replace_all(text, "");
    DISCHARGE_HEADER.replace_all(&text, "").into_owned()
}

/// Values of `姓名：` / `签名：` fields that look like personal names.
pub fn labelled_names(text: &str) -> Vec<String> {
    LABELLED_NAME
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|value| is_chinese_name(value))
        .map(str::to_string)
        .collect()
}

/// Turn fixed-width column gaps into line breaks.
pub fn columns_to_lines(text: &str) -> String {
    COLUMN_GAP.replace_all(text, "\n").into_owned()
}

/// Keep only the Han characters of `s`.
pub fn han_only(s: &str) -> String {
    s.chars().filter(|c| is_han(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_lines_are_two_or_three_han() {
        assert!(is_chinese_name("张三"));
        assert!(is_chinese_name("欧阳娜"));
        assert!(!is_chinese_name("王"));
        assert!(!is_chinese_name("司马相如者"));
        assert!(!is_chinese_name("张三："));
        assert!(!is_chinese_name("Li Si"));
    }

    #[test]
    fn date_lines_accept_all_separators() {
        assert!(is_date_line("2022-07-09"));
        assert!(is_date_line("2022.7.9 09:12"));
        assert!(is_date_line("2022年7月9日"));
        assert!(is_date_line("2022/07/09 9:05"));
        assert!(!is_date_line("2022-07-09 查房"));
        assert!(!is_date_line("入院日期 2022-07-09"));
    }

    #[test]
    fn titles_need_keyword_and_length() {
        assert!(is_section_title("主治医师查房记录"));
        assert!(is_section_title("术后第一天记录（补）"));
        assert!(!is_section_title("查房"));
        assert!(!is_section_title("患者一般情况可"));
        assert!(!is_section_title("主治医师查房记录：患者诉右膝疼痛"));
        assert!(!is_section_title("这是一条非常非常非常非常长的日常病程查房记录"));
    }

    #[test]
    fn admission_header_needs_closing_label() {
        let text = "姓名：张三\n性别：男\n发病节气：立夏\n\n主诉：右膝疼痛3天";
        assert_eq!(strip_privacy_headers(text), "主诉：右膝疼痛3天");

        let open = "姓名：张三\n性别：男\n主诉：右膝疼痛3天";
        assert_eq!(strip_privacy_headers(open), open);
    }

    #[test]
    fn discharge_header_accepts_ascii_colon() {
        let text = "患者姓名:李四 住院号:123 住院天数:12\n入院情况：一般可";
        assert_eq!(strip_privacy_headers(text), "入院情况：一般可");
    }

    #[test]
    fn labelled_names_filter_non_names() {
        let text = "医师签名：李四 \n姓名：王小明\n签名：2022-07-09 \n";
        assert_eq!(labelled_names(text), vec!["李四".to_string(), "王小明".to_string()]);
    }

    #[test]
    fn column_gaps_become_newlines() {
        assert_eq!(columns_to_lines("姓名：张三    性别：男"), "姓名：张三\n性别：男");
        assert_eq!(columns_to_lines("a   b"), "a   b");
    }

    #[test]
    fn timestamp_formats_capture_and_parse() {
        let caps = TimestampFormat::Dotted
            .regex()
            .captures("2021.10.10 08:11 主治医师查房记录")
            .unwrap();
        let stamp = caps.get(1).unwrap().as_str();
        assert_eq!(stamp, "2021.10.10 08:11");
        assert!(TimestampFormat::Dotted.parse(stamp).is_some());

        assert!(!TimestampFormat::Dotted.regex().is_match("2021.10.10 08:11"));
        assert!(TimestampFormat::Hyphenated.regex().is_match("2022-07-09 09:12"));
        assert_eq!(TimestampFormat::Hyphenated.parse("2022-13-09 09:12"), None);
    }

    #[test]
    fn han_only_drops_everything_else() {
        assert_eq!(han_only(" 1.主 诉(A)"), "主诉");
    }
}
