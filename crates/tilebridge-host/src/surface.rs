//! The render surface: grid lines and per-cell tile compositing over a
//! [`Canvas2d`] backend.
//!
//! Cells are addressed by index. A cell at `(x, y)` is painted inside
//! `(x * cell + 1, y * cell + 1)` with side `cell - 2`, leaving a one pixel
//! gap so neighbouring tiles stay distinct. Color `0` means an empty cell
//! and erases the cell; any other color draws the tile image and then
//! multiplies the color over it.

use image::RgbaImage;
use tilebridge_types::{BoardGeometry, BridgeError, BridgeResult, Color, GridStyle};

use crate::loader::ModuleFetcher;

/// Axis-aligned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A straight stroke between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub from: (f64, f64),
    pub to: (f64, f64),
}

/// Compositing operator for fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    SourceOver,
    Multiply,
}

/// The subset of a 2D drawing context the bridge needs.
pub trait Canvas2d {
    /// Resize the backing store, discarding its contents.
    fn resize(&mut self, width: u32, height: u32);
    /// Reset `rect` to transparent.
    fn clear_rect(&mut self, rect: Rect);
    fn stroke_lines(&mut self, lines: &[Line], style: &GridStyle);
    /// Draw `tile` scaled into `dest`. A pending tile draws nothing.
    fn draw_image(&mut self, tile: &TileImage, dest: Rect);
    fn fill_rect(&mut self, rect: Rect, color: Color, op: CompositeOp);
}

/// The decorative tile drawn under every colored cell.
#[derive(Debug, Clone, Default)]
pub enum TileImage {
    /// Not loaded (yet).
    #[default]
    Pending,
    Ready(RgbaImage),
}

impl TileImage {
    pub fn pending() -> Self {
        Self::Pending
    }

    /// Decode an encoded image (PNG, ...).
    pub fn from_bytes(bytes: &[u8]) -> BridgeResult<Self> {
        let image =
            image::load_from_memory(bytes).map_err(|e| BridgeError::Image(e.to_string()))?;
        Ok(Self::Ready(image.to_rgba8()))
    }

    pub async fn load(fetcher: &impl ModuleFetcher, url: &str) -> BridgeResult<Self> {
        let bytes = fetcher.fetch(url).await?;
        let tile = Self::from_bytes(&bytes)?;
        log::debug!("tile image {url} ready");
        Ok(tile)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        match self {
            Self::Ready(image) => Some(image),
            Self::Pending => None,
        }
    }
}

/// Interior grid lines for `geometry`: one vertical line per interior
/// column boundary, then one horizontal line per interior row boundary.
/// The outer border is never stroked.
pub fn grid_lines(geometry: &BoardGeometry) -> Vec<Line> {
    let cell = f64::from(geometry.cell_px);
    let right = f64::from(geometry.width_px()) - 1.0;
    let bottom = f64::from(geometry.height_px()) - 1.0;

    let vertical = (1..geometry.width_cells).map(|i| {
        let x = f64::from(i) * cell;
        Line {
            from: (x, 0.0),
            to: (x, bottom),
        }
    });
    let horizontal = (1..geometry.height_cells).map(|j| {
        let y = f64::from(j) * cell;
        Line {
            from: (0.0, y),
            to: (right, y),
        }
    });
    vertical.chain(horizontal).collect()
}

/// Owns the canvas and the tile asset.
pub struct RenderSurface<C> {
    canvas: C,
    geometry: BoardGeometry,
    grid: GridStyle,
    tile: TileImage,
}

impl<C: Canvas2d> RenderSurface<C> {
    pub fn new(canvas: C, geometry: BoardGeometry, grid: GridStyle) -> Self {
        Self {
            canvas,
            geometry,
            grid,
            tile: TileImage::Pending,
        }
    }

    /// Size the canvas for the board, clear it and draw the grid.
    pub fn init_surface(&mut self, width_cells: u32, height_cells: u32, cell_px: u32) {
        self.geometry = BoardGeometry {
            width_cells,
            height_cells,
            cell_px,
        };
        self.size_canvas();
        self.clear();
        self.draw_grid();
    }

    /// Resize the canvas to the current board geometry. Nothing is drawn.
    pub fn size_canvas(&mut self) {
        self.canvas
            .resize(self.geometry.width_px(), self.geometry.height_px());
    }

    pub fn clear(&mut self) {
        let rect = Rect::new(
            0.0,
            0.0,
            f64::from(self.geometry.width_px()),
            f64::from(self.geometry.height_px()),
        );
        self.canvas.clear_rect(rect);
    }

    pub fn draw_grid(&mut self) {
        let lines = grid_lines(&self.geometry);
        self.canvas.stroke_lines(&lines, &self.grid);
    }

    pub fn draw_block(&mut self, x: u32, y: u32, color: Color) {
        let rect = self.cell_rect(x, y);
        if color.is_empty() {
            self.canvas.clear_rect(rect);
        } else {
            self.canvas.draw_image(&self.tile, rect);
            self.canvas.fill_rect(rect, color, CompositeOp::Multiply);
        }
    }

    /// Pixel rectangle painted for cell `(x, y)`.
    pub fn cell_rect(&self, x: u32, y: u32) -> Rect {
        let cell = f64::from(self.geometry.cell_px);
        Rect::new(
            f64::from(x) * cell + 1.0,
            f64::from(y) * cell + 1.0,
            cell - 2.0,
            cell - 2.0,
        )
    }

    pub fn set_tile(&mut self, tile: TileImage) {
        self.tile = tile;
    }

    pub fn tile(&self) -> &TileImage {
        &self.tile
    }

    pub fn geometry(&self) -> &BoardGeometry {
        &self.geometry
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }
}

/// One recorded canvas call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Resize { width: u32, height: u32 },
    ClearRect(Rect),
    StrokeLines { lines: Vec<Line>, style: GridStyle },
    DrawImage { dest: Rect, tile_ready: bool },
    FillRect { rect: Rect, color: Color, op: CompositeOp },
}

/// A canvas that only records the calls made on it.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Canvas2d for RecordingCanvas {
    fn resize(&mut self, width: u32, height: u32) {
        self.ops.push(DrawOp::Resize { width, height });
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.ops.push(DrawOp::ClearRect(rect));
    }

    fn stroke_lines(&mut self, lines: &[Line], style: &GridStyle) {
        self.ops.push(DrawOp::StrokeLines {
            lines: lines.to_vec(),
            style: *style,
        });
    }

    fn draw_image(&mut self, tile: &TileImage, dest: Rect) {
        self.ops.push(DrawOp::DrawImage {
            dest,
            tile_ready: tile.is_ready(),
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color, op: CompositeOp) {
        self.ops.push(DrawOp::FillRect { rect, color, op });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> RenderSurface<RecordingCanvas> {
        RenderSurface::new(
            RecordingCanvas::new(),
            BoardGeometry::default(),
            GridStyle::default(),
        )
    }

    #[test]
    fn test_default_grid_line_counts() {
        let lines = grid_lines(&BoardGeometry::default());
        let vertical = lines.iter().filter(|l| l.from.0 == l.to.0).count();
        let horizontal = lines.iter().filter(|l| l.from.1 == l.to.1).count();
        assert_eq!((vertical, horizontal), (9, 19));
    }

    #[test]
    fn test_grid_skips_outer_border() {
        let geometry = BoardGeometry::default();
        for line in grid_lines(&geometry) {
            if line.from.0 == line.to.0 {
                assert!(line.from.0 > 0.0 && line.from.0 < f64::from(geometry.width_px()));
                assert_eq!(line.to.1, 999.0);
            } else {
                assert!(line.from.1 > 0.0 && line.from.1 < f64::from(geometry.height_px()));
                assert_eq!(line.to.0, 499.0);
            }
        }
    }

    #[test]
    fn test_cell_rect_inset() {
        let s = surface();
        assert_eq!(s.cell_rect(0, 0), Rect::new(1.0, 1.0, 48.0, 48.0));
        assert_eq!(s.cell_rect(3, 2), Rect::new(151.0, 101.0, 48.0, 48.0));
    }

    #[test]
    fn test_init_surface_sizes_clears_and_grids() {
        let mut s = surface();
        s.init_surface(4, 3, 10);
        let ops = s.canvas().ops();
        assert_eq!(ops[0], DrawOp::Resize { width: 40, height: 30 });
        assert_eq!(ops[1], DrawOp::ClearRect(Rect::new(0.0, 0.0, 40.0, 30.0)));
        match &ops[2] {
            DrawOp::StrokeLines { lines, .. } => assert_eq!(lines.len(), 3 + 2),
            other => panic!("expected grid stroke, got {other:?}"),
        }
    }

    #[test]
    fn test_pending_tile_still_issues_image_draw() {
        let mut s = surface();
        s.draw_block(1, 1, Color::from_raw(0xff0000));
        assert_eq!(
            s.canvas().ops()[0],
            DrawOp::DrawImage {
                dest: Rect::new(51.0, 51.0, 48.0, 48.0),
                tile_ready: false
            }
        );
    }
}
