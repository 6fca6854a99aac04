//! Software rasterizer backing [`Canvas2d`] with an RGBA image.

use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use tilebridge_types::{BridgeError, BridgeResult, Color, GridStyle};

use crate::surface::{Canvas2d, CompositeOp, Line, Rect, TileImage};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An in-memory canvas. Coordinates are clipped to the image.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    image: RgbaImage,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, TRANSPARENT),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// RGBA value at `(x, y)`, or `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Write the current surface to `path` as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> BridgeResult<()> {
        let path = path.as_ref();
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| BridgeError::Image(format!("{}: {e}", path.display())))?;
        log::debug!("surface snapshot saved to {}", path.display());
        Ok(())
    }

    /// Pixel span `[start, end)` covered by `[from, from + len)`, clipped
    /// to `0..limit`.
    fn span(from: f64, len: f64, limit: u32) -> (u32, u32) {
        let start = from.round().clamp(0.0, f64::from(limit)) as u32;
        let end = (from + len).round().clamp(0.0, f64::from(limit)) as u32;
        (start, end.max(start))
    }

    fn for_each_in(&mut self, rect: Rect, mut paint: impl FnMut(u32, u32, &mut Rgba<u8>)) {
        let (x0, x1) = Self::span(rect.x, rect.width, self.image.width());
        let (y0, y1) = Self::span(rect.y, rect.height, self.image.height());
        for y in y0..y1 {
            for x in x0..x1 {
                paint(x, y, self.image.get_pixel_mut(x, y));
            }
        }
    }
}

/// Multiply blend of an opaque source over `backdrop`.
///
/// `co = cs * (1 - ab) + ab * cb * cs`, result fully opaque.
fn multiply(backdrop: Rgba<u8>, color: Color) -> Rgba<u8> {
    let ab = f64::from(backdrop[3]) / 255.0;
    let blend = |cb: u8, cs: u8| {
        let cb = f64::from(cb) / 255.0;
        let cs = f64::from(cs) / 255.0;
        let co = cs * (1.0 - ab) + ab * cb * cs;
        (co * 255.0).round() as u8
    };
    Rgba([
        blend(backdrop[0], color.r()),
        blend(backdrop[1], color.g()),
        blend(backdrop[2], color.b()),
        255,
    ])
}

/// Source-over of `src` onto `dst`, both non-premultiplied.
fn source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = f64::from(src[3]) / 255.0;
    let da = f64::from(dst[3]) / 255.0;
    let oa = sa + da * (1.0 - sa);
    if oa == 0.0 {
        return TRANSPARENT;
    }
    let channel = |s: u8, d: u8| {
        let c = (f64::from(s) * sa + f64::from(d) * da * (1.0 - sa)) / oa;
        c.round() as u8
    };
    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (oa * 255.0).round() as u8,
    ])
}

impl Canvas2d for PixelCanvas {
    fn resize(&mut self, width: u32, height: u32) {
        self.image = RgbaImage::from_pixel(width, height, TRANSPARENT);
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.for_each_in(rect, |_, _, px| *px = TRANSPARENT);
    }

    fn stroke_lines(&mut self, lines: &[Line], style: &GridStyle) {
        let half = f64::from(style.line_width) / 2.0;
        let c = style.color;
        let ink = Rgba([c.r(), c.g(), c.b(), 255]);
        for line in lines {
            let (x0, x1) = (line.from.0.min(line.to.0), line.from.0.max(line.to.0));
            let (y0, y1) = (line.from.1.min(line.to.1), line.from.1.max(line.to.1));
            // Only axis-aligned strokes are needed; others cover their
            // bounding box.
            let rect = if x0 == x1 {
                Rect::new(x0 - half, y0, half * 2.0, y1 - y0 + 1.0)
            } else if y0 == y1 {
                Rect::new(x0, y0 - half, x1 - x0 + 1.0, half * 2.0)
            } else {
                Rect::new(x0 - half, y0 - half, x1 - x0 + half * 2.0, y1 - y0 + half * 2.0)
            };
            self.for_each_in(rect, |_, _, px| *px = ink);
        }
    }

    fn draw_image(&mut self, tile: &TileImage, dest: Rect) {
        let Some(src) = tile.image() else {
            return;
        };
        let (sw, sh) = src.dimensions();
        if sw == 0 || sh == 0 || dest.width <= 0.0 || dest.height <= 0.0 {
            return;
        }
        let (origin_x, origin_y) = (dest.x.round(), dest.y.round());
        self.for_each_in(dest, |x, y, px| {
            // Nearest-neighbour sample.
            let u = ((f64::from(x) - origin_x + 0.5) / dest.width * f64::from(sw)) as u32;
            let v = ((f64::from(y) - origin_y + 0.5) / dest.height * f64::from(sh)) as u32;
            let sample = *src.get_pixel(u.min(sw - 1), v.min(sh - 1));
            *px = source_over(*px, sample);
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color, op: CompositeOp) {
        match op {
            CompositeOp::SourceOver => {
                let ink = Rgba([color.r(), color.g(), color.b(), 255]);
                self.for_each_in(rect, |_, _, px| *px = ink);
            }
            CompositeOp::Multiply => {
                self.for_each_in(rect, |_, _, px| *px = multiply(*px, color));
            }
        }
    }
}
