//! URI and header text helpers used by generated request serializers.

use std::num::NonZeroUsize;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{CodecError, CodecResult};

/// RFC 3986 unreserved characters stay literal; everything else is escaped,
/// including `!'()*` which lenient URI encoders leave alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a URI component strictly.
pub fn extended_encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Substitute a URI label (e.g. `{Bucket}`) in a path template.
///
/// Greedy labels (`{Key+}`) keep their `/` separators and encode each segment on its
/// own. A missing or empty label value is an error, since the request could not be
/// routed.
pub fn resolved_path(
    path: &str,
    label_value: Option<&str>,
    member_name: &str,
    uri_label: &str,
    is_greedy_label: bool,
) -> CodecResult<String> {
    let Some(value) = label_value else {
        return Err(CodecError::InvalidLabel(format!(
            "No value provided for input HTTP label: {member_name}."
        )));
    };
    if value.is_empty() {
        return Err(CodecError::InvalidLabel(format!(
            "Empty value provided for input HTTP label: {member_name}."
        )));
    }
    let encoded = if is_greedy_label {
        value
            .split('/')
            .map(extended_encode_uri_component)
            .collect::<Vec<_>>()
            .join("/")
    } else {
        extended_encode_uri_component(value)
    };
    Ok(path.replacen(uri_label, &encoded, 1))
}

/// Split `value` on `delimiter`, keeping `num_delimiters` pieces together per item.
///
/// Used for header lists whose members themselves contain the delimiter, such as
/// lists of IMF-fixdate timestamps (`"Mon, 16 Dec 2019 ..., Tue, 17 Dec 2019 ..."`
/// splits every second comma).
pub fn split_every(value: &str, delimiter: &str, num_delimiters: NonZeroUsize) -> Vec<String> {
    let segments: Vec<&str> = value.split(delimiter).collect();
    if num_delimiters.get() == 1 {
        return segments.into_iter().map(str::to_string).collect();
    }

    let mut compound = Vec::new();
    let mut current = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if current.is_empty() {
            current.push_str(segment);
        } else {
            current.push_str(delimiter);
            current.push_str(segment);
        }
        if (i + 1) % num_delimiters.get() == 0 {
            compound.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        compound.push(current);
    }
    compound
}

/// Quote a header list member if it contains a comma or a double quote.
pub fn quote_header(part: &str) -> String {
    if part.contains(',') || part.contains('"') {
        format!("\"{}\"", part.replace('"', "\\\""))
    } else {
        part.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn test_extended_encode_uri_component() {
        assert_eq!(extended_encode_uri_component("a b"), "a%20b");
        assert_eq!(extended_encode_uri_component("!'()*"), "%21%27%28%29%2A");
        assert_eq!(extended_encode_uri_component("safe-_.~"), "safe-_.~");
        assert_eq!(extended_encode_uri_component("a/b"), "a%2Fb");
        assert_eq!(extended_encode_uri_component("é"), "%C3%A9");
    }

    #[test]
    fn test_resolved_path() {
        assert_eq!(
            resolved_path("/endpoints/{Name}", Some("my endpoint"), "Name", "{Name}", false)
                .unwrap(),
            "/endpoints/my%20endpoint"
        );
        assert_eq!(
            resolved_path("/objects/{Key+}", Some("a b/c"), "Key", "{Key+}", true).unwrap(),
            "/objects/a%20b/c"
        );
        assert!(matches!(
            resolved_path("/x/{Name}", None, "Name", "{Name}", false),
            Err(CodecError::InvalidLabel(msg)) if msg.starts_with("No value")
        ));
        assert!(matches!(
            resolved_path("/x/{Name}", Some(""), "Name", "{Name}", false),
            Err(CodecError::InvalidLabel(msg)) if msg.starts_with("Empty value")
        ));
    }

    #[test]
    fn test_split_every() {
        assert_eq!(split_every("a,b,c", ",", n(1)), vec!["a", "b", "c"]);
        assert_eq!(
            split_every(
                "Mon, 16 Dec 2019 23:48:18 GMT, Tue, 17 Dec 2019 23:48:18 GMT",
                ",",
                n(2)
            ),
            vec!["Mon, 16 Dec 2019 23:48:18 GMT", " Tue, 17 Dec 2019 23:48:18 GMT"]
        );
        assert_eq!(split_every("a,b,c", ",", n(2)), vec!["a,b", "c"]);
    }

    #[test]
    fn test_quote_header() {
        assert_eq!(quote_header("plain"), "plain");
        assert_eq!(quote_header("a,b"), "\"a,b\"");
        assert_eq!(quote_header("say \"hi\""), "\"say \\\"hi\\\"\"");
    }
}
