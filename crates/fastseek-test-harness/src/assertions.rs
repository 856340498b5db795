use fastseek_core::pixel::PixelBuffer;

/// Assert every pixel in the buffer is fully opaque.
pub fn assert_fully_opaque(buffer: &PixelBuffer) {
    for (i, pixel) in buffer.data.chunks_exact(4).enumerate() {
        assert_eq!(pixel[3], 0xFF, "pixel {i} is not opaque");
    }
}

/// Assert buffer dimensions and backing length agree with the expectation.
pub fn assert_dimensions(buffer: &PixelBuffer, width: u32, height: u32) {
    assert_eq!(buffer.width, width, "unexpected width");
    assert_eq!(buffer.height, height, "unexpected height");
    assert_eq!(
        buffer.data.len(),
        (width * height * 4) as usize,
        "data length doesn't match {width}x{height}x4"
    );
}

/// Assert the red channel rises from the left edge to the right edge of the
/// top row, which is the placeholder gradient property.
pub fn assert_horizontal_red_gradient(buffer: &PixelBuffer) {
    let left = buffer.pixel(0, 0)[0];
    let right = buffer.pixel(buffer.width - 1, 0)[0];
    assert!(
        left < right,
        "red channel does not rise: left {left}, right {right}"
    );
}
