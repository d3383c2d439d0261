#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IngestLimits {
    pub max_line_bytes: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct IngestConfig {
    pub limits: IngestLimits,
    /// Keep the raw line on each record (successful or not) for diagnostics.
    pub capture_raw: bool,
}
