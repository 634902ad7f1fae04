pub const DEFAULT_MAX_FORK_DEPTH: usize = 64;
pub const DEFAULT_MAX_INLINE_DEPTH: usize = 64;

/// Options for [`lower_graph`](crate::passes::lower_graph::lower_graph).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    /// Formal input holding the module to eliminate.
    pub self_offset: usize,
    /// Run the inliner before lowering. Attribute accesses hidden behind
    /// calls are only visible after inlining.
    pub inline: bool,
    /// Bound on nested fork recursion.
    pub max_fork_depth: usize,
    /// Bound on nested call inlining.
    pub max_inline_depth: usize,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            self_offset: 0,
            inline: true,
            max_fork_depth: DEFAULT_MAX_FORK_DEPTH,
            max_inline_depth: DEFAULT_MAX_INLINE_DEPTH,
        }
    }
}

impl LowerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_self_offset(mut self, offset: usize) -> Self {
        self.self_offset = offset;
        self
    }

    pub fn with_inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    pub fn with_max_fork_depth(mut self, depth: usize) -> Self {
        self.max_fork_depth = depth;
        self
    }

    pub fn with_max_inline_depth(mut self, depth: usize) -> Self {
        self.max_inline_depth = depth;
        self
    }
}
