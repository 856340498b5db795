use fastseek_core::pixel::PixelBuffer;

/// Narrow allocation capability for materializing output images, implemented
/// once per target platform. The controller never performs capability
/// discovery per call.
pub trait ImageSink {
    /// Allocate an opaque-black buffer. `None` signals resource exhaustion,
    /// the one condition `seek_to_frame` surfaces as a missing image.
    fn allocate(&self, width: u32, height: u32) -> Option<PixelBuffer>;
}

/// Heap-backed sink.
#[derive(Debug, Default)]
pub struct BufferSink;

impl ImageSink for BufferSink {
    fn allocate(&self, width: u32, height: u32) -> Option<PixelBuffer> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(PixelBuffer::new(width, height))
    }
}
