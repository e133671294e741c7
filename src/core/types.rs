// Shared data model for recognized text, page state and snapshots

use serde::{Deserialize, Serialize};

/// A polygon vertex in full-resolution source image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

/// RGBA display color for a text block overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl BlockColor {
    const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Border colors, cycled by recognition order
pub const BLOCK_PALETTE: [BlockColor; 6] = [
    BlockColor::opaque(255, 0, 0),   // Red
    BlockColor::opaque(0, 255, 0),   // Green
    BlockColor::opaque(0, 0, 255),   // Blue
    BlockColor::opaque(255, 255, 0), // Yellow
    BlockColor::opaque(255, 0, 255), // Violet
    BlockColor::opaque(0, 255, 255), // Cyan
];

/// Palette color for the block at `position` in recognition order
pub fn palette_color(position: usize) -> BlockColor {
    BLOCK_PALETTE[position % BLOCK_PALETTE.len()]
}

/// One region as returned by the recognizer, before it becomes a [`TextBlock`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedRegion {
    pub text: String,
    pub polygon: Vec<Vertex>,
}

/// One recognized (and eventually translated) text region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    /// Empty until translation completes
    pub translated: String,
    pub vertices: Vec<Vertex>,
    pub color: BlockColor,
}

impl TextBlock {
    /// Turn recognizer output into untranslated blocks, assigning palette colors in order.
    pub fn from_regions(regions: Vec<RecognizedRegion>) -> Vec<TextBlock> {
        regions
            .into_iter()
            .enumerate()
            .map(|(i, region)| TextBlock {
                text: region.text,
                translated: String::new(),
                vertices: region.polygon,
                color: palette_color(i),
            })
            .collect()
    }
}

/// Load progress of a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    NotStarted,
    Loading,
    Done,
}

/// Content hash and dimensions of a loaded page image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub hash: String,
    pub width: u32,
    pub height: u32,
}

/// Point-in-time copy of a page, as served to viewers
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub index: usize,
    pub source: String,
    pub status: PageStatus,
    pub ok: bool,
    pub status_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInfo>,
    pub blocks: Vec<TextBlock>,
}
