//! Frame decoding.

use crate::Frame;

/// One decode attempt per frame.
///
/// Decoding is CPU-bound, so the capture loop calls this from the blocking
/// pool. A miss is `None`, not an error: most frames do not contain a
/// readable code.
pub trait FrameDecoder: Send + Sync + 'static {
    fn decode(&self, frame: &Frame) -> Option<String>;
}

/// QR decoder backed by `rqrr`.
///
/// When a frame holds several codes the first one that decodes wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for QrDecoder {
    fn decode(&self, frame: &Frame) -> Option<String> {
        let mut image = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| frame.pixel(x, y),
        );
        let grids = image.detect_grids();
        tracing::trace!(frame = frame.sequence(), grids = grids.len(), "decode attempt");

        grids.iter().find_map(|grid| match grid.decode() {
            Ok((_meta, content)) => Some(content),
            Err(e) => {
                tracing::trace!(frame = frame.sequence(), error = %e, "grid failed to decode");
                None
            }
        })
    }
}
