//! Page-ownership predicate used to bias the dominator computation.
//!
//! Formats that can tell objects owned by the inspected page apart from
//! objects kept alive by tooling supply a per-node flag vector and the bit that
//! marks page ownership. Without one, every node counts as page-owned and the
//! ownership rules become no-ops.

/// Borrowed view over a format's node flags.
#[derive(Clone, Copy, Debug)]
pub struct PageOwnership<'a> {
    flags: Option<&'a [u32]>,
    mask: u32,
}

impl<'a> PageOwnership<'a> {
    /// Every node is page-owned.
    pub fn everything() -> Self {
        Self {
            flags: None,
            mask: 0,
        }
    }

    /// Node `o` is page-owned when `flags[o] & mask != 0`.
    pub fn from_flags(flags: &'a [u32], mask: u32) -> Self {
        Self {
            flags: Some(flags),
            mask,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags.is_some()
    }

    #[inline]
    pub fn owns(&self, ordinal: u32) -> bool {
        self.flags
            .is_none_or(|f| f[ordinal as usize] & self.mask != 0)
    }

    /// An edge from a non-page-owned node into a page-owned node does not count
    /// as ownership, unless it leaves the root.
    #[inline]
    pub fn skips_edge(&self, from: u32, to: u32, root: u32) -> bool {
        from != root && self.owns(to) && !self.owns(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_flags_nothing_is_skipped() {
        let o = PageOwnership::everything();
        assert!(o.owns(5));
        assert!(!o.skips_edge(1, 2, 0));
        assert!(!o.is_active());
    }

    #[test]
    fn tooling_to_page_edges_are_skipped() {
        let flags = [0, 4, 0];
        let o = PageOwnership::from_flags(&flags, 4);
        assert!(o.skips_edge(2, 1, 0));
        assert!(!o.skips_edge(0, 1, 0));
        assert!(!o.skips_edge(1, 2, 0));
    }
}
