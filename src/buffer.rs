//! Frame staging buffers

/// A fragment didn't fit into a [`FrameBuffer`]
///
/// The buffer keeps every byte it held before the failing append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Overflow;

/// Fixed capacity byte buffer for one in-progress frame
///
/// Appends are bounds-checked. A fragment that would run past the capacity
/// is rejected whole; the cursor never wraps.
pub struct FrameBuffer<const N: usize> {
    bytes: heapless::Vec<u8, N>,
}

impl<const N: usize> FrameBuffer<N> {
    /// Create an empty frame buffer
    pub const fn new() -> Self {
        FrameBuffer {
            bytes: heapless::Vec::new(),
        }
    }

    /// Append `fragment` at the cursor
    pub fn append(&mut self, fragment: &[u8]) -> Result<(), Overflow> {
        self.bytes.extend_from_slice(fragment).map_err(|_| Overflow)
    }

    /// Reset the cursor to zero
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// The cursor, or the number of bytes accumulated so far
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
