//! Response normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Prefix of OData control annotations removed from results.
pub const ODATA_PREFIX: &str = "@odata.";

/// Continuation link annotation.
pub const NEXT_LINK: &str = "@odata.nextLink";

/// Result-count annotation.
pub const COUNT: &str = "@odata.count";

/// `_etag` value used when the response carried none.
pub const NO_ETAG: &str = "no-etag-found";

/// Metadata extracted from the response alongside the data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ResponseMeta {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none()
    }
}

/// How a successful response body should be shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub raw_response: bool,
    pub include_headers: bool,
    pub exclude_response: bool,
}

/// A normalized successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub data: Value,
    pub meta: ResponseMeta,
}

/// Parse a 2xx body.
///
/// An empty body becomes `{"message":"OK!"}` and a non-JSON body is carried
/// as `rawResponse` text.
pub fn parse_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return json!({ "message": "OK!" });
    }
    match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => json!({
            "message": "OK!",
            "rawResponse": String::from_utf8_lossy(body),
        }),
    }
}

/// Remove every `@odata.`-prefixed key, at any depth.
pub fn strip_odata(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !key.starts_with(ODATA_PREFIX));
            map.values_mut().for_each(strip_odata);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_odata),
        _ => {}
    }
}

/// Shape a parsed body according to `options`.
pub fn normalize(mut data: Value, etag: Option<&str>, options: NormalizeOptions) -> NormalizedResponse {
    let mut meta = ResponseMeta::default();

    if options.include_headers {
        let etag = etag.unwrap_or(NO_ETAG).to_string();
        if let Value::Object(map) = &mut data {
            map.insert("_etag".to_string(), Value::String(etag.clone()));
        }
        meta.etag = Some(etag);
    }

    if options.exclude_response {
        return NormalizedResponse {
            data: json!({ "success": true }),
            meta,
        };
    }

    if !options.raw_response {
        strip_odata(&mut data);
    }

    NormalizedResponse { data, meta }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_variants() {
        assert_eq!(parse_body(b""), json!({ "message": "OK!" }));
        assert_eq!(parse_body(br#"{"id":"1"}"#), json!({ "id": "1" }));
        assert_eq!(
            parse_body(b"plain text"),
            json!({ "message": "OK!", "rawResponse": "plain text" })
        );
    }

    #[test]
    fn test_strip_odata_at_every_depth() {
        let mut value = json!({
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users",
            "@odata.count": 2,
            "value": [
                {
                    "@odata.etag": "W/\"abc\"",
                    "id": "1",
                    "organizer": {
                        "@odata.type": "#microsoft.graph.recipient",
                        "emailAddress": { "name": "Ada", "address": "ada@example.com" }
                    }
                },
                { "id": "2", "tags": ["@odata.not-a-key"] }
            ]
        });

        strip_odata(&mut value);

        assert_eq!(
            value,
            json!({
                "value": [
                    {
                        "id": "1",
                        "organizer": {
                            "emailAddress": { "name": "Ada", "address": "ada@example.com" }
                        }
                    },
                    { "id": "2", "tags": ["@odata.not-a-key"] }
                ]
            })
        );
    }

    #[test]
    fn test_raw_mode_keeps_annotations() {
        let data = json!({ "@odata.mediaContentType": "image/png" });
        let result = normalize(
            data.clone(),
            None,
            NormalizeOptions {
                raw_response: true,
                ..Default::default()
            },
        );
        assert_eq!(result.data, data);
    }

    #[test]
    fn test_include_headers_records_etag() {
        let result = normalize(
            json!({ "id": "1" }),
            Some("W/\"42\""),
            NormalizeOptions {
                include_headers: true,
                ..Default::default()
            },
        );
        assert_eq!(result.data["_etag"], "W/\"42\"");
        assert_eq!(result.meta.etag.as_deref(), Some("W/\"42\""));

        let missing = normalize(
            json!([1, 2]),
            None,
            NormalizeOptions {
                include_headers: true,
                ..Default::default()
            },
        );
        assert_eq!(missing.data, json!([1, 2]));
        assert_eq!(missing.meta.etag.as_deref(), Some(NO_ETAG));
    }

    #[test]
    fn test_exclude_response() {
        let result = normalize(
            json!({ "id": "1" }),
            None,
            NormalizeOptions {
                exclude_response: true,
                ..Default::default()
            },
        );
        assert_eq!(result.data, json!({ "success": true }));
    }
}
