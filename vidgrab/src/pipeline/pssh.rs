use data_encoding::BASE64;
use regex::Regex;

use crate::pipeline::error::PipelineError;
use crate::pipeline::metadata::get_text;

/**
    Which occurrence of the protection-header element actually works for
    license negotiation. The provider's manifests repeat the header verbatim
    and license servers reject the first copy, so the selection is ordinal:
    always the second match, never "the first one found".
*/
const USABLE_OCCURRENCE: usize = 1;

/**
    Fetch a media-manifest document and extract the Widevine protection
    header embedded in it, decoded to raw bytes.
*/
pub async fn fetch_protection_header(
    client: &reqwest::Client,
    mpd_url: &str,
) -> Result<Vec<u8>, PipelineError> {
    let body = get_text(client, mpd_url).await?;
    extract_protection_header(&body)
}

pub fn extract_protection_header(document: &str) -> Result<Vec<u8>, PipelineError> {
    let element = Regex::new(r"<cenc:pssh>(.*?)</cenc:pssh>").expect("static pattern");

    let headers: Vec<&str> = element
        .captures_iter(document)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str())
        .collect();

    let usable = headers
        .get(USABLE_OCCURRENCE)
        .ok_or(PipelineError::HeaderNotFound(headers.len()))?;

    BASE64
        .decode(usable.trim().as_bytes())
        .map_err(|e| PipelineError::Parse(format!("protection header is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(payloads: &[&[u8]]) -> String {
        let mut doc = String::from("<MPD><Period><ContentProtection>");
        for payload in payloads {
            doc.push_str(&format!("<cenc:pssh>{}</cenc:pssh>", BASE64.encode(payload)));
        }
        doc.push_str("</ContentProtection></Period></MPD>");
        doc
    }

    #[test]
    fn second_occurrence_wins() {
        let doc = document(&[b"first", b"second", b"third"]);
        assert_eq!(extract_protection_header(&doc).unwrap(), b"second");
    }

    #[test]
    fn single_occurrence_is_not_enough() {
        let doc = document(&[b"only"]);
        let err = extract_protection_header(&doc).unwrap_err();
        assert!(matches!(err, PipelineError::HeaderNotFound(1)));
    }

    #[test]
    fn no_occurrence_reports_zero() {
        let err = extract_protection_header("<MPD></MPD>").unwrap_err();
        assert!(matches!(err, PipelineError::HeaderNotFound(0)));
    }

    #[test]
    fn undecodable_header_is_a_parse_error() {
        let doc = "<cenc:pssh>AAAA</cenc:pssh><cenc:pssh>!!!</cenc:pssh>";
        let err = extract_protection_header(doc).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let payload = BASE64.encode(b"second");
        let doc = format!(
            "<cenc:pssh>AAAA</cenc:pssh><cenc:pssh> {payload} </cenc:pssh>"
        );
        assert_eq!(extract_protection_header(&doc).unwrap(), b"second");
    }
}
