use encoding_rs::Encoding;

use super::IngestError;

/// Resolve WHATWG encoding labels (`utf-8`, `gbk`, `gb18030`, ...).
pub fn resolve_encodings(labels: &[String]) -> Result<Vec<&'static Encoding>, IngestError> {
    labels
        .iter()
        .map(|label| {
            Encoding::for_label(label.as_bytes())
                .ok_or_else(|| IngestError::UnknownEncoding(label.clone()))
        })
        .collect()
}

/// Decode `bytes` with the first candidate that decodes without errors.
///
/// A byte-order mark overrides the candidate list. Returns the text and the
/// name of the encoding that succeeded.
pub fn decode_with_fallback(
    bytes: &[u8],
    candidates: &[&'static Encoding],
) -> Option<(String, &'static str)> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
        if !had_errors {
            return Some((text.into_owned(), encoding.name()));
        }
    }

    candidates.iter().find_map(|encoding| {
        let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
        (!had_errors).then(|| (text.into_owned(), encoding.name()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<&'static Encoding> {
        resolve_encodings(&["utf-8".into(), "gbk".into(), "gb18030".into()]).unwrap()
    }

    #[test]
    fn utf8_is_tried_first() {
        let (text, name) = decode_with_fallback("主诉：右膝疼痛".as_bytes(), &defaults()).unwrap();
        assert_eq!(text, "主诉：右膝疼痛");
        assert_eq!(name, "UTF-8");
    }

    #[test]
    fn gbk_bytes_fall_back() {
        let (bytes, _, _) = encoding_rs::GBK.encode("主诉：右膝疼痛");
        let (text, name) = decode_with_fallback(&bytes, &defaults()).unwrap();
        assert_eq!(text, "主诉：右膝疼痛");
        assert_eq!(name, "GBK");
    }

    #[test]
    fn bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("现病史".as_bytes());
        let (text, _) = decode_with_fallback(&bytes, &defaults()).unwrap();
        assert_eq!(text, "现病史");
    }

    #[test]
    fn nothing_decodes_without_candidates_that_fit() {
        let (bytes, _, _) = encoding_rs::GBK.encode("主诉");
        let utf8_only = resolve_encodings(&["utf-8".into()]).unwrap();
        assert!(decode_with_fallback(&bytes, &utf8_only).is_none());
    }

    #[test]
    fn unknown_label_is_an_error() {
        let err = resolve_encodings(&["klingon".into()]).unwrap_err();
        assert!(matches!(err, IngestError::UnknownEncoding(label) if label == "klingon"));
    }
}
