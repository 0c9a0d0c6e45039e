//! Upload request decoding
//!
//! Query parameters `u`, `ts`, `signature` plus a header-less CSV body.

use serde::Deserialize;

use super::errors::{IngestError, IngestResult};

/// A decoded upload: who sent it, how it was signed, and its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub uploader: String,
    pub timestamp: String,
    pub signature: String,
    pub rows: Vec<Vec<String>>,
}

impl UploadRequest {
    pub fn new(
        uploader: impl Into<String>,
        timestamp: impl Into<String>,
        signature: impl Into<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            uploader: uploader.into(),
            timestamp: timestamp.into(),
            signature: signature.into(),
            rows,
        }
    }

    /// Builds a request from raw query parameters and body bytes.
    pub fn from_parts(query: UploadQuery, body: &[u8]) -> IngestResult<Self> {
        let (uploader, timestamp, signature) = query.into_required()?;
        let rows = parse_csv_body(body)?;
        Ok(Self {
            uploader,
            timestamp,
            signature,
            rows,
        })
    }
}

/// Raw query string of `POST /api/upload`.
///
/// Every field is optional at this level so that a missing parameter can be
/// reported in the `{"err": ...}` body instead of by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadQuery {
    pub u: Option<String>,
    pub ts: Option<String>,
    pub signature: Option<String>,
}

impl UploadQuery {
    fn into_required(self) -> IngestResult<(String, String, String)> {
        let u = self.u.ok_or(IngestError::MissingParameter("u"))?;
        let ts = self.ts.ok_or(IngestError::MissingParameter("ts"))?;
        let signature = self
            .signature
            .ok_or(IngestError::MissingParameter("signature"))?;
        Ok((u, ts, signature))
    }
}

/// Parses a CSV body without a header row.
///
/// Values are trimmed and blank lines skipped. Rows may differ in length;
/// checking widths against the uploader's columns happens later.
pub fn parse_csv_body(body: &[u8]) -> IngestResult<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::MalformedBody(e.to_string()))?;
        if is_blank_line(body, &record) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

// A whitespace-only line trims down to a single empty field, but so does a
// quoted `""`. Only the raw line tells them apart.
fn is_blank_line(body: &[u8], record: &csv::StringRecord) -> bool {
    if record.len() != 1 || record.get(0).map_or(false, |v| !v.is_empty()) {
        return false;
    }
    let start = record.position().map_or(0, |p| p.byte() as usize);
    body.get(start..)
        .unwrap_or_default()
        .iter()
        .skip_while(|b| matches!(**b, b'\r' | b'\n'))
        .take_while(|b| **b != b'\n')
        .all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_rows_without_header() {
        let rows = parse_csv_body(b"a1,42\nb2,7\n").unwrap();
        assert_eq!(
            rows,
            vec![vec!["a1".to_string(), "42".to_string()], vec!["b2".to_string(), "7".to_string()]]
        );
    }

    #[test]
    fn test_values_trimmed_and_blank_lines_skipped() {
        let rows = parse_csv_body(b" a1 ,  42\n\n   \nb2,7").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["a1", "42"]);
        assert_eq!(rows[1], vec!["b2", "7"]);
    }

    #[test]
    fn test_quoted_empty_value_is_a_row() {
        let rows = parse_csv_body(b"a\n\"\"\nb\n").unwrap();
        assert_eq!(rows, vec![vec!["a"], vec![""], vec!["b"]]);

        let rows = parse_csv_body(b"a\n\n   \n\" \"\nb\n").unwrap();
        assert_eq!(rows, vec![vec!["a"], vec![""], vec!["b"]]);
    }

    #[test]
    fn test_ragged_rows_kept_as_is() {
        let rows = parse_csv_body(b"a1,42\nb2\nc3,1,extra\n").unwrap();
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1].len(), 1);
        assert_eq!(rows[2].len(), 3);
    }

    #[test]
    fn test_quoted_values_and_empty_fields() {
        let rows = parse_csv_body(b"\"a,1\",,\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(rows[0], vec!["a,1", "", "say \"hi\""]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let rows = parse_csv_body(b"a1,42\r\nb2,7\r\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["b2", "7"]);
    }

    #[test]
    fn test_empty_body_yields_no_rows() {
        assert!(parse_csv_body(b"").unwrap().is_empty());
        assert!(parse_csv_body(b"\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let err = parse_csv_body(b"a1,\xff\xfe\n").unwrap_err();
        assert!(matches!(err, IngestError::MalformedBody(_)));
    }

    #[test]
    fn test_missing_query_parameters() {
        let query = UploadQuery {
            u: Some("acme".into()),
            ts: None,
            signature: Some("sig".into()),
        };
        let err = UploadRequest::from_parts(query, b"a1,42").unwrap_err();
        assert!(matches!(err, IngestError::MissingParameter("ts")));

        let err = UploadRequest::from_parts(UploadQuery::default(), b"").unwrap_err();
        assert!(matches!(err, IngestError::MissingParameter("u")));
    }

    #[test]
    fn test_from_parts() {
        let query = UploadQuery {
            u: Some("acme".into()),
            ts: Some("1".into()),
            signature: Some("sig".into()),
        };
        let request = UploadRequest::from_parts(query, b"a1,42\n").unwrap();
        assert_eq!(request, UploadRequest::new("acme", "1", "sig", vec![vec!["a1".into(), "42".into()]]));
    }
}
