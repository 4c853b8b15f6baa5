//! Encoder MIME type negotiation.

/// Candidate containers/codecs, best first.
pub const CODEC_PREFERENCES: [&str; 3] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Used when the platform reports none of the preferences as supported.
pub const FALLBACK_MIME_TYPE: &str = "video/webm";

/// First entry of [`CODEC_PREFERENCES`] accepted by `is_supported`.
pub fn select_mime_type<F>(is_supported: F) -> &'static str
where
    F: Fn(&str) -> bool,
{
    CODEC_PREFERENCES
        .iter()
        .copied()
        .find(|candidate| is_supported(candidate))
        .unwrap_or(FALLBACK_MIME_TYPE)
}
