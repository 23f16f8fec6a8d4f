//! Captured frames.

use std::sync::Arc;

/// One 8-bit greyscale image from a camera.
///
/// Pixels are row-major, one byte per pixel. The buffer is shared, so
/// cloning a frame to hand it to the decoder does not copy the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    luma: Arc<[u8]>,
    sequence: u64,
}

impl Frame {
    /// Wraps a luma buffer. Returns `None` if its length is not
    /// `width * height`.
    pub fn from_luma(width: u32, height: u32, luma: Vec<u8>) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?;
        if luma.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            luma: luma.into(),
            sequence: 0,
        })
    }

    /// An all-white frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            luma: vec![u8::MAX; width as usize * height as usize].into(),
            sequence: 0,
        }
    }

    /// Stamps the frame's position in its stream.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Position in the stream, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    /// Brightness at `(x, y)`; out-of-bounds reads are white.
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        if x >= self.width as usize || y >= self.height as usize {
            return u8::MAX;
        }
        self.luma[y * self.width as usize + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_luma_rejects_wrong_length() {
        assert!(Frame::from_luma(4, 4, vec![0; 15]).is_none());
        assert!(Frame::from_luma(4, 4, vec![0; 16]).is_some());
    }

    #[test]
    fn test_pixel_reads_row_major() {
        let mut luma = vec![u8::MAX; 6];
        luma[5] = 7; // (2, 1)
        let frame = Frame::from_luma(3, 2, luma).unwrap();

        assert_eq!(frame.pixel(2, 1), 7);
        assert_eq!(frame.pixel(0, 0), u8::MAX);
        assert_eq!(frame.pixel(3, 0), u8::MAX);
    }
}
