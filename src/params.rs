//! Normalization of startup options before they reach the catalog or the
//! query engine. Values may arrive copied straight out of a browser address
//! bar, so they are percent-decoded, lowercased and stripped of one pair of
//! matching surrounding quotes.

use std::borrow::Cow;

fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if s.len() >= 2 {
        let first = bytes[0];
        let last = bytes[s.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

pub fn preprocess_param(param: &str) -> String {
    let decoded: Cow<'_, str> = urlencoding::decode(param).unwrap_or(Cow::Borrowed(param));
    strip_quotes(decoded.to_lowercase().trim()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_and_lowercases() {
        assert_eq!(preprocess_param("Stars%3A100"), "stars:100");
        assert_eq!(preprocess_param("OWNER%3Afoo%20bar"), "owner:foo bar");
    }

    #[test]
    fn strips_matching_quotes_only() {
        assert_eq!(preprocess_param("\"pushed:desc\""), "pushed:desc");
        assert_eq!(preprocess_param("'kicad'"), "kicad");
        assert_eq!(preprocess_param("\"unbalanced'"), "\"unbalanced'");
        assert_eq!(preprocess_param("'"), "'");
    }

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(preprocess_param("owner:foo"), "owner:foo");
        assert_eq!(preprocess_param(""), "");
    }
}
