//! First-page rasterization and PNG encoding.
//!
//! The page is rendered at a fixed 4x scale into an offscreen RGBA surface,
//! then encoded losslessly with the highest compression setting.

use crate::blob::Blob;
use crate::engine::EngineHandle;
use crate::error::{ConversionError, Result};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::time::Instant;
use tracing::{debug, warn};

/// Linear magnification applied to the page (1.0 = one pixel per PDF point).
pub const RENDER_SCALE: f32 = 4.0;

/// The page that gets rendered (1-indexed).
pub const FIRST_PAGE: u16 = 1;

/// Largest surface side in pixels, matching common canvas limits.
pub const MAX_SURFACE_DIMENSION: u32 = 32_767;

/// Largest surface area in pixels (1 GiB of RGBA).
pub const MAX_SURFACE_PIXELS: u64 = 268_435_456;

/// Pixel-space rectangle for a page at a given scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Linear scale factor.
    pub scale: f32,
    /// Width in whole pixels.
    pub width: u32,
    /// Height in whole pixels.
    pub height: u32,
}

impl Viewport {
    /// Viewport for a page of the given size in PDF points. Fractional pixels
    /// are truncated.
    pub fn for_page_size(width_points: f32, height_points: f32, scale: f32) -> Self {
        Self {
            scale,
            width: (width_points * scale) as u32,
            height: (height_points * scale) as u32,
        }
    }

    /// Whether the viewport has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether a surface of this size can be allocated.
    pub fn fits_surface_limits(&self) -> bool {
        self.width <= MAX_SURFACE_DIMENSION
            && self.height <= MAX_SURFACE_DIMENSION
            && self.pixel_count() <= MAX_SURFACE_PIXELS
    }
}

/// Image smoothing quality of a [`RasterSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothingQuality {
    #[default]
    Low,
    Medium,
    High,
}

/// Offscreen RGBA pixel buffer used as the render target.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    viewport: Viewport,
    pixels: RgbaImage,
    smoothing_enabled: bool,
    smoothing_quality: SmoothingQuality,
}

impl RasterSurface {
    /// Allocate a transparent surface sized to `viewport`.
    ///
    /// Viewports beyond [`MAX_SURFACE_PIXELS`] or [`MAX_SURFACE_DIMENSION`]
    /// get an empty surface instead.
    pub fn new(viewport: Viewport) -> Self {
        if !viewport.fits_surface_limits() {
            warn!(
                "Surface of {}x{} exceeds limits, leaving it empty",
                viewport.width, viewport.height
            );
            return Self::empty(viewport);
        }
        Self::from_pixels(viewport, RgbaImage::new(viewport.width, viewport.height))
    }

    /// A surface with no pixels.
    pub fn empty(viewport: Viewport) -> Self {
        Self::from_pixels(viewport, RgbaImage::default())
    }

    fn from_pixels(viewport: Viewport, pixels: RgbaImage) -> Self {
        Self {
            viewport,
            pixels,
            smoothing_enabled: false,
            smoothing_quality: SmoothingQuality::default(),
        }
    }

    /// Configure image smoothing.
    pub fn with_smoothing(mut self, enabled: bool, quality: SmoothingQuality) -> Self {
        self.smoothing_enabled = enabled;
        self.smoothing_quality = quality;
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn smoothing_enabled(&self) -> bool {
        self.smoothing_enabled
    }

    pub fn smoothing_quality(&self) -> SmoothingQuality {
        self.smoothing_quality
    }

    /// Raw RGBA pixels.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// pdfium render settings for a viewport-sized bitmap.
fn render_config(viewport: Viewport, smoothing: SmoothingQuality) -> PdfRenderConfig {
    let smooth = smoothing != SmoothingQuality::Low;

    PdfRenderConfig::new()
        .set_target_width(viewport.width as i32)
        .set_target_height(viewport.height as i32)
        .set_text_smoothing(smooth)
        .set_image_smoothing(smooth)
        .set_path_smoothing(smooth)
}

/// Parse `bytes` and render page one into a new surface.
///
/// Blocking; run on the blocking pool.
pub fn render_first_page(engine: &EngineHandle, bytes: &[u8]) -> Result<RasterSurface> {
    let start = Instant::now();

    let document = engine
        .pdfium()
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ConversionError::Decode(e.to_string()))?;

    let page_count = document.pages().len();
    let page = document
        .pages()
        .get(FIRST_PAGE - 1)
        .map_err(|_| ConversionError::PageNotFound {
            page: FIRST_PAGE,
            page_count,
        })?;

    let viewport = Viewport::for_page_size(page.width().value, page.height().value, RENDER_SCALE);
    debug!(
        "Rendering page {} of {} at {}x{}",
        FIRST_PAGE, page_count, viewport.width, viewport.height
    );

    if viewport.is_empty() {
        warn!("Page {} has an empty viewport, nothing to render", FIRST_PAGE);
        return Ok(RasterSurface::empty(viewport));
    }
    if !viewport.fits_surface_limits() {
        warn!(
            "Page {} needs a {}x{} surface, over the limit",
            FIRST_PAGE, viewport.width, viewport.height
        );
        return Ok(RasterSurface::empty(viewport));
    }

    let bitmap = page
        .render_with_config(&render_config(viewport, SmoothingQuality::High))
        .map_err(|e| ConversionError::Render(format!("page {}: {}", FIRST_PAGE, e)))?;
    let surface = RasterSurface::from_pixels(viewport, bitmap.as_image().into_rgba8())
        .with_smoothing(true, SmoothingQuality::High);

    debug!("Rendered page {} in {:?}", FIRST_PAGE, start.elapsed());
    Ok(surface)
}

/// Encode the surface to a PNG blob. `None` when no image could be produced.
pub fn encode_png(surface: &RasterSurface) -> Option<Blob> {
    if surface.is_empty() {
        warn!("Refusing to encode an empty surface");
        return None;
    }

    match encode_rgba(surface.pixels()) {
        Ok(data) => Some(Blob::png(data)),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

fn encode_rgba(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());

    let mut encoder = png::Encoder::new(&mut buffer, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Best);

    let mut writer = encoder.write_header().map_err(|e| {
        ConversionError::PngEncodingError(format!("Failed to write PNG header: {}", e))
    })?;

    writer.write_image_data(image.as_raw()).map_err(|e| {
        ConversionError::PngEncodingError(format!("Failed to write PNG data: {}", e))
    })?;

    drop(writer);

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba};

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_viewport_us_letter_at_render_scale() {
        let viewport = Viewport::for_page_size(612.0, 792.0, RENDER_SCALE);
        assert_eq!(viewport.width, 2448);
        assert_eq!(viewport.height, 3168);
        assert_eq!(viewport.scale, 4.0);
    }

    #[test]
    fn test_viewport_truncates_fractional_pixels() {
        // A4: 595.28 x 841.89 points
        let viewport = Viewport::for_page_size(595.28, 841.89, RENDER_SCALE);
        assert_eq!(viewport.width, 2381);
        assert_eq!(viewport.height, 3367);
    }

    #[test]
    fn test_viewport_degenerate_page() {
        let viewport = Viewport::for_page_size(0.1, 792.0, RENDER_SCALE);
        assert_eq!(viewport.width, 0);
        assert!(viewport.is_empty());

        let negative = Viewport::for_page_size(-10.0, 10.0, RENDER_SCALE);
        assert_eq!(negative.width, 0);
    }

    #[test]
    fn test_surface_sized_to_viewport() {
        let surface = RasterSurface::new(Viewport::for_page_size(10.0, 20.0, RENDER_SCALE));
        assert_eq!(surface.width(), 40);
        assert_eq!(surface.height(), 80);
        assert!(!surface.is_empty());
        assert!(!surface.smoothing_enabled());
    }

    #[test]
    fn test_surface_smoothing() {
        let surface = RasterSurface::new(Viewport::for_page_size(1.0, 1.0, 1.0))
            .with_smoothing(true, SmoothingQuality::High);
        assert!(surface.smoothing_enabled());
        assert_eq!(surface.smoothing_quality(), SmoothingQuality::High);
    }

    #[test]
    fn test_surface_from_rendered_pixels() {
        let viewport = Viewport::for_page_size(2.0, 2.0, 1.0);
        let surface =
            RasterSurface::from_pixels(viewport, RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));

        assert_eq!(surface.viewport(), viewport);
        assert_eq!(surface.width(), 2);
        assert_eq!(surface.pixels().get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_encode_png_produces_png_blob() {
        let surface = RasterSurface::from_pixels(
            Viewport::for_page_size(10.0, 10.0, 1.0),
            RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255])),
        );

        let blob = encode_png(&surface).unwrap();

        assert_eq!(blob.mime_type(), "image/png");
        assert_eq!(&blob.bytes()[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_encode_png_decodes_to_same_dimensions() {
        let surface = RasterSurface::new(Viewport::for_page_size(3.0, 5.0, 2.0));
        let blob = encode_png(&surface).unwrap();

        let decoded = image::load_from_memory(blob.bytes()).unwrap();
        assert_eq!(decoded.width(), 6);
        assert_eq!(decoded.height(), 10);
    }

    #[test]
    fn test_encode_png_empty_surface_yields_no_blob() {
        let surface = RasterSurface::new(Viewport::for_page_size(0.0, 0.0, RENDER_SCALE));
        assert!(encode_png(&surface).is_none());
    }

    #[test]
    fn test_viewport_surface_limits() {
        let letter = Viewport::for_page_size(612.0, 792.0, RENDER_SCALE);
        assert!(letter.fits_surface_limits());

        // 200 x 200 inches at 4x is 57600 px per side.
        let poster = Viewport::for_page_size(14_400.0, 14_400.0, RENDER_SCALE);
        assert_eq!(poster.pixel_count(), 57_600 * 57_600);
        assert!(!poster.fits_surface_limits());

        // Under the area limit but too wide.
        let strip = Viewport::for_page_size(10_000.0, 1.0, RENDER_SCALE);
        assert!(strip.pixel_count() <= MAX_SURFACE_PIXELS);
        assert!(!strip.fits_surface_limits());
    }

    #[test]
    fn test_oversized_surface_is_not_allocated() {
        let viewport = Viewport::for_page_size(14_400.0, 14_400.0, RENDER_SCALE);
        let surface = RasterSurface::new(viewport);

        assert!(surface.is_empty());
        assert_eq!(surface.pixels().as_raw().len(), 0);
        assert_eq!(surface.viewport(), viewport);
        assert!(encode_png(&surface).is_none());
    }
}
