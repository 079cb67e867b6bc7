//! Timestamp-driven segmentation of daily progress notes.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::normalize::normalize;
use super::patterns::TimestampFormat;

/// One chronologically bounded progress-note entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseRecord {
    /// 1-based position among the non-empty records of the note.
    pub ordinal: usize,
    /// Timestamp that opens the record; `None` for text before the first
    /// stamp or when the stamp is not a valid calendar time.
    pub recorded_at: Option<NaiveDateTime>,
    /// Normalized record text, never empty.
    pub text: String,
}

/// Splits a progress-note blob on one timestamp layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordSplitter {
    format: TimestampFormat,
}

impl RecordSplitter {
    pub fn new(format: TimestampFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> TimestampFormat {
        self.format
    }

    /// Split `text` into records bounded by consecutive timestamp matches.
    ///
    /// Text before the first match forms its own leading record. Spans that
    /// normalize to nothing are dropped. Without any match the whole text is a
    /// single record; empty input yields no records.
    pub fn split(&self, text: &str) -> Vec<CourseRecord> {
        let mut bounds: Vec<(usize, Option<NaiveDateTime>)> = Vec::new();
        for caps in self.format.regex().captures_iter(text) {
            let (Some(whole), Some(stamp)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            bounds.push((whole.start(), self.format.parse(stamp.as_str())));
        }

        if bounds.first().map_or(true, |(start, _)| *start > 0) {
            bounds.insert(0, (0, None));
        }

        let mut records = Vec::with_capacity(bounds.len());
        for (i, (start, recorded_at)) in bounds.iter().enumerate() {
            let end = bounds.get(i + 1).map_or(text.len(), |(next, _)| *next);
            let body = normalize(&text[*start..end]);
            if body.is_empty() {
                continue;
            }
            records.push(CourseRecord {
                ordinal: records.len() + 1,
                recorded_at: *recorded_at,
                text: body,
            });
        }

        tracing::debug!(
            format = ?self.format,
            boundaries = bounds.len(),
            records = records.len(),
            "Course note split"
        );

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn empty_text_has_no_records() {
        assert!(RecordSplitter::default().split("").is_empty());
        assert!(RecordSplitter::default().split("  \n\t ").is_empty());
    }

    #[test]
    fn no_timestamp_gives_single_normalized_record() {
        let text = "  患者病情平稳，\n\n\n继续当前治疗。  ";
        let records = RecordSplitter::default().split(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, normalize(text));
        assert_eq!(records[0].ordinal, 1);
        assert_eq!(records[0].recorded_at, None);
    }

    #[test]
    fn hyphenated_stamps_bound_records() {
        let text = "2022-07-09 09:12 首次查房\n患者右膝疼痛。\n2022-07-10 08:30 主治医师查房\n疼痛减轻。";
        let records = RecordSplitter::new(TimestampFormat::Hyphenated).split(text);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "2022-07-09 09:12 首次查房\n患者右膝疼痛。");
        assert_eq!(records[1].text, "2022-07-10 08:30 主治医师查房\n疼痛减轻。");
        assert_eq!(
            records[1].recorded_at,
            NaiveDate::from_ymd_opt(2022, 7, 10).and_then(|d| d.and_hms_opt(8, 30, 0))
        );
        assert_eq!(records[1].ordinal, 2);
    }

    #[test]
    fn dotted_stamps_need_a_title() {
        let text = "2021.10.10 08:11 主治医师查房记录\n病情稳定\n2021.10.11 08:00\n未见异常";
        let records = RecordSplitter::new(TimestampFormat::Dotted).split(text);
        assert_eq!(records.len(), 1);
        assert!(records[0].text.contains("2021.10.11 08:00"));
    }

    #[test]
    fn preamble_before_first_stamp_is_kept() {
        let text = "日常病程记录\n2022-07-09 09:12 查房\n无不适";
        let records = RecordSplitter::default().split(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "日常病程记录");
        assert_eq!(records[0].recorded_at, None);
    }

    #[test]
    fn adjacent_stamps_do_not_produce_empty_records() {
        let text = "2022-07-09 09:12 2022-07-09 09:13 查房";
        let records = RecordSplitter::default().split(text);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.text.is_empty()));
    }

    #[test]
    fn concatenation_reconstructs_text_modulo_whitespace() {
        let text = "入院第一天\n2022-07-09 09:12  查房：*右膝*肿胀\n\n\n2022-07-10 10:00 查房：肿胀减轻\n2022-07-11 10:00 查房：出院";
        let records = RecordSplitter::default().split(text);
        let joined: String = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(squash(&joined), squash(&normalize(text)));
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn other_format_is_left_as_content() {
        let text = "2022-07-09 09:12 查房\n补记：2021.10.10 08:11 主治医师查房记录";
        let records = RecordSplitter::new(TimestampFormat::Hyphenated).split(text);
        assert_eq!(records.len(), 1);
        assert!(records[0].text.contains("2021.10.10 08:11"));
    }
}
