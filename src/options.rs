//! Parse configuration threaded through the entry points.

/// Options for the grammar engine and the include driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Emit a `trace` log record for every definition built.
    pub debug: bool,
    /// Record line/column positions on AST nodes. When off, every `Pos` is zero,
    /// which makes trees comparable regardless of layout.
    pub positions: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            debug: false,
            positions: true,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_positions(mut self, positions: bool) -> Self {
        self.positions = positions;
        self
    }
}
