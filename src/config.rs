/// Tuning knobs for an [`Analysis`][crate::analysis::Analysis] session.
///
/// # Examples
///
/// ```
/// use flowqual::config::Config;
///
/// let config = Config::default().with_cache_bits(12).with_interesting_only(true);
/// assert_eq!(config.cache_bits, 12);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Size (`2^bits` slots) of the effect hash-consing cache and of the
    /// membership query cache.
    pub cache_bits: usize,
    /// Only close store cells of interesting locations (and explicitly
    /// propagated cells) when the graph is finalized. Other cells are closed
    /// when first queried.
    pub interesting_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_bits: 14,
            interesting_only: false,
        }
    }
}

impl Config {
    pub fn with_cache_bits(mut self, bits: usize) -> Self {
        assert!(bits <= 31, "Cache bits should be in the range 0..=31");
        self.cache_bits = bits;
        self
    }

    pub fn with_interesting_only(mut self, interesting_only: bool) -> Self {
        self.interesting_only = interesting_only;
        self
    }
}
