//! Render surface protocol and software raster.
//!
//! Tests validate:
//! - Color hex formatting for the whole 24-bit range
//! - `draw_block` call sequences for empty and colored cells
//! - Grid lines only at interior cell boundaries
//! - Tile compositing and PNG snapshots on the pixel canvas

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use proptest::prelude::*;
use tilebridge_host::{
    grid_lines, Canvas2d, CompositeOp, DrawOp, PixelCanvas, RecordingCanvas, RenderSurface,
    TileImage,
};
use tilebridge_types::{BoardGeometry, BridgeError, Color, GridStyle};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn recording_surface() -> RenderSurface<RecordingCanvas> {
    RenderSurface::new(
        RecordingCanvas::new(),
        BoardGeometry::default(),
        GridStyle::default(),
    )
}

fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

fn pixel_surface(tile: TileImage) -> RenderSurface<PixelCanvas> {
    let mut surface = RenderSurface::new(
        PixelCanvas::new(0, 0),
        BoardGeometry::default(),
        GridStyle::default(),
    );
    surface.init_surface(10, 20, 50);
    surface.set_tile(tile);
    surface
}

// ══════════════════════════════════════════════════════════════════════════════
// Properties
// ══════════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every 24-bit color formats as exactly six lowercase hex digits.
    #[test]
    fn hex_is_six_lowercase_digits(raw in 0u32..=0xFF_FFFF) {
        let hex = Color::from_raw(raw).hex();
        prop_assert_eq!(hex.len(), 6);
        prop_assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        prop_assert_eq!(u32::from_str_radix(&hex, 16).unwrap(), raw);
    }

    /// Empty cells erase without touching the tile; colored cells draw the
    /// tile once, then multiply the color once.
    #[test]
    fn draw_block_call_sequence(x in 0u32..10, y in 0u32..20, raw in 0u32..=0xFF_FFFF) {
        let mut surface = recording_surface();
        let color = Color::from_raw(raw);
        surface.draw_block(x, y, color);
        let rect = surface.cell_rect(x, y);
        let ops = surface.canvas_mut().take_ops();
        if raw == 0 {
            prop_assert_eq!(ops, vec![DrawOp::ClearRect(rect)]);
        } else {
            prop_assert_eq!(
                ops,
                vec![
                    DrawOp::DrawImage { dest: rect, tile_ready: false },
                    DrawOp::FillRect { rect, color, op: CompositeOp::Multiply },
                ]
            );
        }
    }

    /// Grid lines sit strictly inside the board, on cell boundaries.
    #[test]
    fn grid_lines_are_interior(w in 1u32..30, h in 1u32..30, cell in 2u32..64) {
        let geometry = BoardGeometry { width_cells: w, height_cells: h, cell_px: cell };
        let lines = grid_lines(&geometry);
        prop_assert_eq!(lines.len() as u32, (w - 1) + (h - 1));
        for line in lines {
            let vertical = line.from.0 == line.to.0;
            let (pos, extent) = if vertical {
                (line.from.0, geometry.width_px())
            } else {
                (line.from.1, geometry.height_px())
            };
            prop_assert!(pos > 0.0 && pos < f64::from(extent));
            prop_assert_eq!(pos % f64::from(cell), 0.0);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Recording surface
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn default_board_grid_has_nine_and_nineteen_lines() {
    let mut surface = recording_surface();
    surface.draw_grid();
    match &surface.canvas().ops()[0] {
        DrawOp::StrokeLines { lines, style } => {
            let vertical = lines.iter().filter(|l| l.from.0 == l.to.0).count();
            assert_eq!(vertical, 9);
            assert_eq!(lines.len() - vertical, 19);
            assert_eq!(style.color.css(), "#001717");
            assert_eq!(style.line_width, 2.0);
        }
        other => panic!("expected a grid stroke, got {other:?}"),
    }
}

#[test]
fn ready_tile_is_reported_to_canvas() {
    let mut surface = recording_surface();
    surface.set_tile(TileImage::Ready(RgbaImage::new(4, 4)));
    surface.draw_block(0, 0, Color::from_raw(5));
    assert!(matches!(
        surface.canvas().ops()[0],
        DrawOp::DrawImage { tile_ready: true, .. }
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Tile images
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn tile_from_png_bytes() {
    let png = png_bytes(&RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255])));
    let tile = TileImage::from_bytes(&png).unwrap();
    let image = tile.image().unwrap();
    assert_eq!(image.dimensions(), (3, 2));
    assert_eq!(image.get_pixel(2, 1), &Rgba([1, 2, 3, 255]));
}

#[test]
fn tile_from_garbage_is_image_error() {
    let err = TileImage::from_bytes(b"definitely not a png").unwrap_err();
    assert!(matches!(err, BridgeError::Image(_)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Pixel canvas
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn init_surface_draws_grid_pixels() {
    let surface = pixel_surface(TileImage::Pending);
    let canvas = surface.canvas();
    assert_eq!((canvas.width(), canvas.height()), (500, 1000));
    // Line at x = 50 covers columns 49 and 50.
    assert_eq!(canvas.pixel(49, 10), Some([0x00, 0x17, 0x17, 255]));
    assert_eq!(canvas.pixel(50, 10), Some([0x00, 0x17, 0x17, 255]));
    assert_eq!(canvas.pixel(25, 25), Some([0, 0, 0, 0]));
    // No outer border.
    assert_eq!(canvas.pixel(0, 10), Some([0, 0, 0, 0]));
    assert_eq!(canvas.pixel(499, 10), Some([0, 0, 0, 0]));
}

#[test]
fn colored_block_multiplies_over_tile() {
    let tile = RgbaImage::from_fn(2, 2, |x, _| {
        if x == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([128, 128, 128, 255])
        }
    });
    let mut surface = pixel_surface(TileImage::Ready(tile));
    surface.draw_block(1, 0, Color::from_raw(0xff8000));
    let canvas = surface.canvas();
    // Left half of the cell samples the white texel: pure color.
    assert_eq!(canvas.pixel(60, 20), Some([0xff, 0x80, 0x00, 255]));
    // Right half samples the grey texel: color darkened.
    assert_eq!(canvas.pixel(90, 20), Some([128, 64, 0, 255]));
    // The inset pixel row stays untouched.
    assert_eq!(canvas.pixel(75, 0), Some([0, 0, 0, 0]));
}

#[test]
fn colored_block_without_tile_is_flat_color() {
    let mut surface = pixel_surface(TileImage::Pending);
    surface.draw_block(0, 0, Color::from_raw(0x123456));
    assert_eq!(surface.canvas().pixel(25, 25), Some([0x12, 0x34, 0x56, 255]));
}

#[test]
fn empty_block_erases_cell() {
    let mut surface = pixel_surface(TileImage::Pending);
    surface.draw_block(2, 3, Color::from_raw(0xabcdef));
    surface.draw_block(2, 3, Color::EMPTY);
    let canvas = surface.canvas();
    assert_eq!(canvas.pixel(125, 175), Some([0, 0, 0, 0]));
    // Grid next to the cell survives the erase.
    assert_eq!(canvas.pixel(150, 175), Some([0x00, 0x17, 0x17, 255]));
}

#[test]
fn source_over_fill_replaces_pixels() {
    let mut canvas = PixelCanvas::new(8, 8);
    canvas.fill_rect(
        tilebridge_host::Rect::new(2.0, 2.0, 4.0, 4.0),
        Color::from_raw(0x0000ff),
        CompositeOp::SourceOver,
    );
    assert_eq!(canvas.pixel(3, 3), Some([0, 0, 255, 255]));
    assert_eq!(canvas.pixel(1, 1), Some([0, 0, 0, 0]));
}

#[test]
fn snapshot_saves_png() {
    let mut surface = pixel_surface(TileImage::Pending);
    surface.draw_block(0, 0, Color::from_raw(0x00ff00));
    let path = std::env::temp_dir().join(format!(
        "tilebridge-snapshot-{}.png",
        std::process::id()
    ));
    surface.canvas().save_png(&path).unwrap();
    let reloaded = image::open(&path).unwrap().to_rgba8();
    std::fs::remove_file(&path).ok();
    assert_eq!(reloaded.dimensions(), (500, 1000));
    assert_eq!(reloaded.get_pixel(25, 25), &Rgba([0, 255, 0, 255]));
}
