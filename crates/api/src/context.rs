/// API version requested by the first path segment (`/{api_version}/...`).
///
/// Inserted into request extensions by [`crate::middleware::version_middleware`].
/// Each resource decides what a missing or unknown number means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedVersion {
    raw: String,
    number: Option<u32>,
}

impl RequestedVersion {
    /// Accepts `v1`, `V1` and `1` (any non-negative integer); anything else is "no version".
    pub fn parse(segment: &str) -> Self {
        let digits = segment
            .strip_prefix('v')
            .or_else(|| segment.strip_prefix('V'))
            .unwrap_or(segment);

        let number = if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            digits.parse().ok()
        } else {
            None
        };

        Self {
            raw: segment.to_string(),
            number,
        }
    }

    /// The path segment exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn number(&self) -> Option<u32> {
        self.number
    }
}
