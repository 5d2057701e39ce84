/// Bounds applied while decoding attacker-supplied data.
///
/// Every count read from the wire is checked against these limits before
/// anything is allocated for it.
///
/// # Examples
/// ```rust
/// use ad_group_sids::Limits;
///
/// let limits = Limits::default().with_max_token_len(16 * 1024);
/// assert_eq!(limits.max_token_len, 16 * 1024);
/// assert_eq!(limits.max_nesting_depth, Limits::DEFAULT.max_nesting_depth);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct Limits {
    /// Largest negotiation token accepted, in bytes.
    pub max_token_len: usize,
    /// Largest declared count for any SID-bearing PAC array.
    pub max_sids_per_list: u32,
    /// Deepest `AD-IF-RELEVANT` nesting that is unwrapped.
    pub max_nesting_depth: usize,
}

impl Limits {
    /// Default limits.
    pub const DEFAULT: Self = Self {
        max_token_len: 65_535,
        max_sids_per_list: 4_096,
        max_nesting_depth: 8,
    };

    /// Sets [`Limits::max_token_len`].
    #[must_use]
    #[inline]
    pub const fn with_max_token_len(mut self, max_token_len: usize) -> Self {
        self.max_token_len = max_token_len;
        self
    }

    /// Sets [`Limits::max_sids_per_list`].
    #[must_use]
    #[inline]
    pub const fn with_max_sids_per_list(mut self, max_sids_per_list: u32) -> Self {
        self.max_sids_per_list = max_sids_per_list;
        self
    }

    /// Sets [`Limits::max_nesting_depth`].
    #[must_use]
    #[inline]
    pub const fn with_max_nesting_depth(mut self, max_nesting_depth: usize) -> Self {
        self.max_nesting_depth = max_nesting_depth;
        self
    }
}

impl Default for Limits {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(all(test, feature = "serde"))]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod test {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let limits: Limits = serde_json::from_str(r#"{ "max_sids_per_list": 64 }"#).unwrap();
        assert_eq!(limits, Limits::DEFAULT.with_max_sids_per_list(64));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<Limits>(r#"{ "max_sids": 64 }"#).is_err());
    }
}
