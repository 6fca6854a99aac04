//! Bridge configuration.
//!
//! Every field has a default, so a partial JSON document only overrides
//! what it names:
//!
//! ```json
//! { "geometry": { "cell_px": 40 }, "abi": { "construct": "Game_new" } }
//! ```

use serde::{Deserialize, Serialize};

use crate::{BridgeResult, Color, TouchPhase};

/// Board size in cells and the pixel size of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardGeometry {
    pub width_cells: u32,
    pub height_cells: u32,
    pub cell_px: u32,
}

impl BoardGeometry {
    pub fn width_px(&self) -> u32 {
        self.width_cells * self.cell_px
    }

    pub fn height_px(&self) -> u32 {
        self.height_cells * self.cell_px
    }
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self {
            width_cells: 10,
            height_cells: 20,
            cell_px: 50,
        }
    }
}

/// Stroke used for the static grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridStyle {
    pub color: Color,
    pub line_width: f32,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            color: Color::from_raw(0x001717),
            line_width: 2.0,
        }
    }
}

/// Names of the guest's exports and of the import module it links against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestAbi {
    pub import_module: String,
    pub memory: String,
    pub construct: String,
    pub tick: String,
    pub key_event: String,
    pub touch_start: String,
    pub touch_end: String,
    pub touch_cancel: String,
    pub touch_move: String,
    pub allocate: String,
    pub stack_push: String,
    pub stack_pop: String,
}

impl GuestAbi {
    /// Export names used by the `rstetris` game guest.
    pub fn rstetris() -> Self {
        Self {
            construct: "Game_new".into(),
            tick: "Game_tick".into(),
            key_event: "Game_key_handler".into(),
            touch_start: "Game_touch_start_handler".into(),
            touch_end: "Game_touch_end_handler".into(),
            touch_cancel: "Game_touch_cancel_handler".into(),
            touch_move: "Game_touch_move_handler".into(),
            allocate: "alloc".into(),
            ..Self::default()
        }
    }

    /// The export handling the given touch phase.
    pub fn touch_export(&self, phase: TouchPhase) -> &str {
        match phase {
            TouchPhase::Start => &self.touch_start,
            TouchPhase::End => &self.touch_end,
            TouchPhase::Cancel => &self.touch_cancel,
            TouchPhase::Move => &self.touch_move,
        }
    }
}

impl Default for GuestAbi {
    fn default() -> Self {
        Self {
            import_module: "env".into(),
            memory: "memory".into(),
            construct: "construct".into(),
            tick: "tick".into(),
            key_event: "key_event".into(),
            touch_start: "touch_start".into(),
            touch_end: "touch_end".into(),
            touch_cancel: "touch_cancel".into(),
            touch_move: "touch_move".into(),
            allocate: "allocate".into(),
            stack_push: "stack_push".into(),
            stack_pop: "stack_pop".into(),
        }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub geometry: BoardGeometry,
    pub grid: GridStyle,
    /// Location of the guest binary, relative to the asset root.
    pub module_url: String,
    /// Location of the decorative tile image, relative to the asset root.
    pub tile_image_url: String,
    pub abi: GuestAbi,
    /// Display refresh period.
    pub frame_interval_ms: f64,
}

impl BridgeConfig {
    /// Parse a (possibly partial) JSON configuration document.
    pub fn from_json_str(json: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            geometry: BoardGeometry::default(),
            grid: GridStyle::default(),
            module_url: "rstetris.wasm".into(),
            tile_image_url: "tile.png".into(),
            abi: GuestAbi::default(),
            frame_interval_ms: 1000.0 / 60.0,
        }
    }
}
