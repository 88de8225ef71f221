/// Errors reported by [`create_flat_map`](crate::create_flat_map) and
/// [`get_region_attributes`](crate::get_region_attributes).
///
/// [`BufferTooSmall`](Self::BufferTooSmall) is not a failure in the usual
/// sense: it is the first half of the two-call protocol and carries the
/// number of region slots the next call needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlatMapError {
    /// Malformed call: architecture mismatch, null storage with a non-zero
    /// capacity, an unpopulated map, a zero-length or overflowing range.
    #[error("invalid parameter")]
    InvalidParameter,

    /// The caller's storage cannot hold every region.
    #[error("buffer too small: {required} regions required")]
    BufferTooSmall {
        /// Number of regions the walk produced.
        required: usize,
    },

    /// No root table is installed, or no single region covers the request.
    #[error("not found")]
    NotFound,
}
