//! Grid geometry: validates the active layout and sizes its cells.

use crate::config::LayoutConfig;
use crate::error::LayoutError;
use serde::Deserialize;
use serde_json::Value;

/// Share of the shorter viewport side used as padding around each button
const PADDING_RATIO: f64 = 0.1;

/// Drawing surface size in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> Option<Aspect> {
        if self.height > self.width {
            Some(Aspect::Portrait)
        } else if self.width > self.height {
            Some(Aspect::Landscape)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    Portrait,
    Landscape,
}

/// When a `rotation` hint swaps the rows and columns of `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub horizontal_flips_when: Aspect,
    pub vertical_flips_when: Aspect,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            horizontal_flips_when: Aspect::Portrait,
            vertical_flips_when: Aspect::Landscape,
        }
    }
}

impl RotationPolicy {
    pub fn flips(&self, rotation: Option<&str>, viewport: Viewport) -> bool {
        let trigger = match rotation {
            Some("horizontal") => self.horizontal_flips_when,
            Some("vertical") => self.vertical_flips_when,
            _ => return false,
        };
        viewport.aspect() == Some(trigger)
    }
}

/// What to show in cells past the end of a short `buttons` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmptyCells {
    /// Nothing at all
    #[default]
    Absent,
    /// An inert outline so the grid shape stays visible
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutPolicy {
    pub rotation: RotationPolicy,
    pub empty_cells: EmptyCells,
}

/// Derived sizes for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub rows: u32,
    pub cols: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub square_size: u32,
    pub padding: u32,
    pub flipped: bool,
    /// Number of buttons that get a cell
    pub button_count: usize,
}

impl GridGeometry {
    /// Top-left corner of cell `index` (row-major).
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let cols = self.cols.max(1) as usize;
        let col = (index % cols) as u32;
        let row = (index / cols) as u32;
        (col * self.cell_width, row * self.cell_height)
    }
}

/// Parse `"RxC"` into `(rows, cols)`.
pub fn parse_size(size: &str) -> Result<(u32, u32), LayoutError> {
    let invalid = || LayoutError::InvalidSize(size.to_string());
    let (rows, cols) = size.split_once('x').ok_or_else(invalid)?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(rows) || !all_digits(cols) {
        return Err(invalid());
    }
    let rows = rows.parse().map_err(|_| invalid())?;
    let cols = cols.parse().map_err(|_| invalid())?;
    Ok((rows, cols))
}

/// Validate `config` and size its grid for `viewport`.
pub fn compute_geometry(
    config: &LayoutConfig,
    viewport: Viewport,
    policy: &LayoutPolicy,
) -> Result<GridGeometry, LayoutError> {
    let size = match config.size() {
        Some(Value::String(s)) if !s.trim().is_empty() => s.as_str(),
        _ => return Err(LayoutError::MissingSize),
    };
    let (mut rows, mut cols) = parse_size(size)?;
    let buttons = config.buttons().ok_or(LayoutError::MissingButtons)?;

    let flipped = policy.rotation.flips(config.rotation(), viewport);
    if flipped {
        std::mem::swap(&mut rows, &mut cols);
    }

    let button_count = buttons.len().min(rows as usize * cols as usize);
    if let Some(index) = buttons[..button_count].iter().position(|b| b.macro_name().is_none()) {
        return Err(LayoutError::MissingMacro { index });
    }

    let Viewport { width, height } = viewport;
    let padding = (PADDING_RATIO * width.min(height) as f64).floor() as u32;

    let (cell_width, cell_height, square_size) = if rows == 0 || cols == 0 {
        (0, 0, 0)
    } else {
        let per_col = width as f64 / cols as f64;
        let per_row = height as f64 / rows as f64;
        let square = per_col.min(per_row).floor() as u32;
        (width / cols, height / rows, square.saturating_sub(2 * padding))
    };

    Ok(GridGeometry {
        rows,
        cols,
        cell_width,
        cell_height,
        square_size,
        padding,
        flipped,
        button_count,
    })
}
