//! Render passes: what is on screen and which regions react to clicks.
//!
//! A pass is built from scratch every time and owns the display exclusively:
//! it is an auth prompt, a config picker, a grid or a message, never a mix.
//! Coordinates are layout units (see `layout::Viewport`).

use crate::config::LayoutConfig;
use crate::dispatch::{ButtonId, CooldownMap};
use crate::error::LayoutError;
use crate::icon::IconOutcome;
use crate::layout::{compute_geometry, EmptyCells, GridGeometry, LayoutPolicy, Viewport};
use crate::style::{self, ButtonStyle};
use image::DynamicImage;
use std::sync::Arc;

/// Smallest button face drawn, so tiny grids stay clickable
pub const MIN_FACE: u32 = 6;

/// Height of a picker option in layout units (three terminal rows)
const OPTION_HEIGHT: u32 = 6;
const OPTION_GAP: u32 = 2;

pub type WidgetId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Centred square of side `side`, at least `MIN_FACE` and at most the
    /// shorter side of this rect
    fn square(&self, side: u32) -> Rect {
        let side = side.max(MIN_FACE).min(self.width).min(self.height);
        self.centered(side, side)
    }

    /// A `width` x `height` rect centred inside this one
    fn centered(&self, width: u32, height: u32) -> Rect {
        let width = width.min(self.width);
        let height = height.min(self.height);
        Rect {
            x: self.x + (self.width - width) / 2,
            y: self.y + (self.height - height) / 2,
            width,
            height,
        }
    }
}

/// What activating a widget does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    RunMacro { button: ButtonId, macro_name: String },
    SelectConfig(usize),
    SubmitPassword,
}

#[derive(Debug, Clone)]
pub struct CellWidget {
    pub button: ButtonId,
    #[allow(dead_code)]
    pub cell: Rect,
    /// The square button inside the cell
    pub face: Rect,
    /// `text`, else the macro name; shown when an icon cannot be drawn
    pub caption: String,
    pub style: ButtonStyle,
    pub icon: Option<Arc<DynamicImage>>,
}

#[derive(Debug, Clone)]
pub struct GridView {
    pub geometry: GridGeometry,
    pub background: Option<String>,
    pub cells: Vec<CellWidget>,
    /// Inert outlines for trailing empty cells (placeholder policy only)
    pub placeholders: Vec<Rect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOption {
    pub entry: usize,
    pub name: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub enum View {
    Empty,
    Message { kind: MessageKind, text: String },
    Auth { error: Option<String>, submit: Rect },
    Picker(Vec<PickerOption>),
    Grid(GridView),
}

/// One complete screen plus its handler table and cooldown state.
pub struct RenderPass {
    pub generation: u64,
    pub view: View,
    handlers: Vec<(WidgetId, Rect, Handler)>,
    pub cooldowns: CooldownMap,
}

impl RenderPass {
    fn new(generation: u64, view: View) -> Self {
        Self {
            generation,
            view,
            handlers: Vec::new(),
            cooldowns: CooldownMap::default(),
        }
    }

    pub fn empty(generation: u64) -> Self {
        Self::new(generation, View::Empty)
    }

    pub fn message(generation: u64, kind: MessageKind, text: impl Into<String>) -> Self {
        Self::new(generation, View::Message { kind, text: text.into() })
    }

    /// Password prompt with a submit button centred below the input line.
    pub fn auth(generation: u64, viewport: Viewport, error: Option<String>) -> Self {
        let screen = Rect::new(0, 0, viewport.width, viewport.height);
        let submit = screen.centered(16, OPTION_HEIGHT);
        let submit = Rect { y: submit.y + OPTION_HEIGHT, ..submit };
        let mut pass = Self::new(generation, View::Auth { error, submit });
        pass.handlers.push((0, submit, Handler::SubmitPassword));
        pass
    }

    /// One option per named config, stacked and centred.
    pub fn picker(generation: u64, viewport: Viewport, names: &[(usize, &str)]) -> Self {
        let widest = names.iter().map(|(_, n)| n.chars().count() as u32).max().unwrap_or(0);
        let width = (widest + 8).min(viewport.width);
        let count = names.len() as u32;
        let total = count * OPTION_HEIGHT + count.saturating_sub(1) * OPTION_GAP;
        let top = viewport.height.saturating_sub(total) / 2;
        let left = viewport.width.saturating_sub(width) / 2;

        let options: Vec<PickerOption> = names
            .iter()
            .enumerate()
            .map(|(i, (entry, name))| PickerOption {
                entry: *entry,
                name: name.to_string(),
                rect: Rect::new(left, top + i as u32 * (OPTION_HEIGHT + OPTION_GAP), width, OPTION_HEIGHT),
            })
            .collect();

        let handlers = options
            .iter()
            .enumerate()
            .map(|(id, opt)| (id, opt.rect, Handler::SelectConfig(opt.entry)))
            .collect();

        Self {
            handlers,
            ..Self::new(generation, View::Picker(options))
        }
    }

    /// Topmost widget under a point.
    pub fn hit(&self, x: u32, y: u32) -> Option<WidgetId> {
        self.handlers
            .iter()
            .find(|(_, rect, _)| rect.contains(x, y))
            .map(|(id, _, _)| *id)
    }

    pub fn handler(&self, id: WidgetId) -> Option<&Handler> {
        self.handlers.iter().find(|(wid, _, _)| *wid == id).map(|(_, _, h)| h)
    }

    #[allow(dead_code)]
    pub fn handlers(&self) -> impl Iterator<Item = (WidgetId, &Handler)> {
        self.handlers.iter().map(|(id, _, h)| (*id, h))
    }

    pub fn grid(&self) -> Option<&GridView> {
        match &self.view {
            View::Grid(grid) => Some(grid),
            _ => None,
        }
    }
}

/// A validated grid waiting for its icon probes.
#[derive(Debug, Clone)]
pub struct PendingGrid {
    pub generation: u64,
    pub geometry: GridGeometry,
    viewport: Viewport,
    config: LayoutConfig,
    empty_cells: EmptyCells,
}

/// Validate and size the grid. Layout errors abort the pass here, before
/// any probe is started.
pub fn begin_grid(
    config: &LayoutConfig,
    viewport: Viewport,
    policy: &LayoutPolicy,
    generation: u64,
) -> Result<PendingGrid, LayoutError> {
    let geometry = compute_geometry(config, viewport, policy)?;
    Ok(PendingGrid {
        generation,
        geometry,
        viewport,
        config: config.clone(),
        empty_cells: policy.empty_cells,
    })
}

impl PendingGrid {
    /// Macro names of the laid-out buttons, in cell order
    pub fn macros(&self) -> Vec<String> {
        self.config
            .buttons()
            .unwrap_or_default()
            .iter()
            .take(self.geometry.button_count)
            .filter_map(|b| b.macro_name().map(str::to_string))
            .collect()
    }

    /// Build the grid once every probe has answered. Missing outcomes count
    /// as "no icon".
    pub fn complete(self, icons: &[IconOutcome]) -> RenderPass {
        let geometry = self.geometry;
        let buttons = self.config.buttons().unwrap_or_default();
        let mut cells = Vec::with_capacity(geometry.button_count);
        let mut handlers = Vec::with_capacity(geometry.button_count);

        for (index, spec) in buttons.iter().take(geometry.button_count).enumerate() {
            let Some(macro_name) = spec.macro_name() else { continue };
            let outcome = icons.get(index).cloned().unwrap_or_default();
            let style = style::resolve(spec, geometry.square_size, outcome.exists);

            let cell = cell_rect(&geometry, index);
            let face = cell.square(style.size);
            let button = ButtonId { generation: self.generation, index };

            handlers.push((
                index,
                face,
                Handler::RunMacro { button, macro_name: macro_name.to_string() },
            ));
            cells.push(CellWidget {
                button,
                cell,
                face,
                caption: spec.text().unwrap_or(macro_name).to_string(),
                style,
                icon: outcome.image,
            });
        }

        let placeholders = match self.empty_cells {
            EmptyCells::Absent => Vec::new(),
            EmptyCells::Placeholder => visible_cells(&geometry, self.viewport)
                .filter(|&i| i >= geometry.button_count)
                .map(|i| cell_rect(&geometry, i).square(geometry.square_size))
                .collect(),
        };

        let cooldowns = CooldownMap::new(cells.iter().map(|c| c.button));
        RenderPass {
            generation: self.generation,
            view: View::Grid(GridView {
                geometry,
                background: self.config.background().map(str::to_string),
                cells,
                placeholders,
            }),
            handlers,
            cooldowns,
        }
    }
}

/// Indices of the cells whose origin lies inside the viewport, in cell order.
/// Zero-sized cells all start at the edge, so one row or column stands for them.
fn visible_cells(geometry: &GridGeometry, viewport: Viewport) -> impl Iterator<Item = usize> {
    let span = |count: u32, cell: u32, extent: u32| {
        if cell == 0 {
            count.min(1)
        } else {
            count.min(extent.div_ceil(cell))
        }
    };
    let rows = span(geometry.rows, geometry.cell_height, viewport.height);
    let cols = span(geometry.cols, geometry.cell_width, viewport.width);
    let stride = geometry.cols as usize;
    (0..rows as usize).flat_map(move |row| (0..cols as usize).map(move |col| row * stride + col))
}

fn cell_rect(geometry: &GridGeometry, index: usize) -> Rect {
    let (x, y) = geometry.cell_origin(index);
    Rect::new(x, y, geometry.cell_width, geometry.cell_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ButtonState;
    use crate::style::Label;
    use serde_json::{json, Value};

    fn pending(doc: Value, vp: Viewport, policy: LayoutPolicy) -> Result<PendingGrid, LayoutError> {
        begin_grid(&LayoutConfig::new(doc), vp, &policy, 1)
    }

    #[test]
    fn three_buttons_on_two_by_two() {
        let doc = json!({"size": "2x2", "buttons": [{"macro": "a"}, {"macro": "b"}, {"macro": "c"}]});
        let grid = pending(doc, Viewport::new(800, 480), LayoutPolicy::default()).unwrap();
        assert_eq!(grid.macros(), vec!["a", "b", "c"]);

        let pass = grid.complete(&[IconOutcome::default(), IconOutcome::default(), IconOutcome::default()]);
        let view = pass.grid().unwrap();
        assert_eq!(view.cells.len(), 3);
        assert!(view.placeholders.is_empty());
        for (cell, name) in view.cells.iter().zip(["a", "b", "c"]) {
            assert_eq!(cell.style.label, Label::Text(name.into()));
            assert_eq!(cell.style.bg, style::DEFAULT_BG);
            assert_eq!(cell.style.fg, style::DEFAULT_FG);
        }
        assert_eq!(pass.cooldowns.len(), 3);
        assert_eq!(pass.handlers().count(), 3);
    }

    #[test]
    fn long_list_is_truncated_to_the_grid() {
        let buttons: Vec<Value> = (0..10).map(|i| json!({"macro": format!("m{i}")})).collect();
        let doc = json!({"size": "2x3", "buttons": buttons});
        let pass = pending(doc, Viewport::new(600, 400), LayoutPolicy::default())
            .unwrap()
            .complete(&[]);
        assert_eq!(pass.grid().unwrap().cells.len(), 6);
    }

    #[test]
    fn placeholders_fill_trailing_cells_when_enabled() {
        let doc = json!({"size": "2x2", "buttons": [{"macro": "a"}]});
        let policy = LayoutPolicy { empty_cells: EmptyCells::Placeholder, ..LayoutPolicy::default() };
        let pass = pending(doc, Viewport::new(400, 400), policy).unwrap().complete(&[]);
        let view = pass.grid().unwrap();
        assert_eq!(view.cells.len(), 1);
        assert_eq!(view.placeholders.len(), 3);
        // Placeholders are not clickable
        assert_eq!(pass.handlers().count(), 1);
    }

    #[test]
    fn placeholders_are_limited_to_cells_on_screen() {
        let policy = LayoutPolicy { empty_cells: EmptyCells::Placeholder, ..LayoutPolicy::default() };

        let doc = json!({"size": "60000x60000", "buttons": [{"macro": "a"}]});
        let pass = pending(doc, Viewport::new(80, 48), policy).unwrap().complete(&[]);
        let view = pass.grid().unwrap();
        assert_eq!(view.cells.len(), 1);
        assert!(view.placeholders.is_empty());

        // Three 16-unit rows fit; every column collapses onto the left edge
        let doc = json!({"size": "3x60000", "buttons": [{"macro": "a"}]});
        let pass = pending(doc, Viewport::new(80, 48), policy).unwrap().complete(&[]);
        assert_eq!(pass.grid().unwrap().placeholders.len(), 2);
    }

    #[test]
    fn layout_error_produces_no_pending_grid() {
        let doc = json!({"size": "2-2", "buttons": [{"macro": "a"}]});
        let err = pending(doc, Viewport::new(100, 100), LayoutPolicy::default()).unwrap_err();
        assert_eq!(err, LayoutError::InvalidSize("2-2".into()));
    }

    #[test]
    fn faces_are_centred_in_their_cells_and_hit_tested() {
        // 2x2 on 400x400: cells 200x200, padding 40, square 200 - 80 = 120
        let doc = json!({"size": "2x2", "buttons": [{"macro": "a"}, {"macro": "b"}, {"macro": "c"}, {"macro": "d"}]});
        let pass = pending(doc, Viewport::new(400, 400), LayoutPolicy::default()).unwrap().complete(&[]);
        let view = pass.grid().unwrap();
        assert_eq!(view.cells[0].face, Rect::new(40, 40, 120, 120));
        assert_eq!(view.cells[3].face, Rect::new(240, 240, 120, 120));

        assert_eq!(pass.hit(100, 100), Some(0));
        assert_eq!(pass.hit(300, 100), Some(1));
        assert_eq!(pass.hit(10, 10), None);
        match pass.handler(1) {
            Some(Handler::RunMacro { button, macro_name }) => {
                assert_eq!(macro_name, "b");
                assert_eq!(button.index, 1);
                assert_eq!(pass.cooldowns.state(*button), Some(ButtonState::Idle));
            }
            other => panic!("unexpected handler {:?}", other),
        }
    }

    #[test]
    fn scaled_faces_are_clamped_to_the_cell() {
        let doc = json!({"size": "1x1", "buttons": [{"macro": "a", "scale": 10}]});
        let pass = pending(doc, Viewport::new(100, 50), LayoutPolicy::default()).unwrap().complete(&[]);
        let cell = &pass.grid().unwrap().cells[0];
        assert_eq!(cell.face, Rect::new(25, 0, 50, 50));
    }

    #[test]
    fn icon_outcome_switches_label() {
        let doc = json!({"size": "1x2", "buttons": [{"macro": "a", "text": "A"}, {"macro": "b", "text": "B"}]});
        let icons = [IconOutcome { exists: true, image: None }, IconOutcome::default()];
        let pass = pending(doc, Viewport::new(200, 100), LayoutPolicy::default()).unwrap().complete(&icons);
        let cells = &pass.grid().unwrap().cells;
        assert!(matches!(cells[0].style.label, Label::Icon(_)));
        assert_eq!(cells[0].caption, "A");
        assert_eq!(cells[1].style.label, Label::Text("B".into()));
    }

    #[test]
    fn caption_falls_back_to_the_macro() {
        let doc = json!({"size": "1x1", "buttons": [{"macro": "mute", "text": "  "}]});
        let icons = [IconOutcome { exists: true, image: None }];
        let pass = pending(doc, Viewport::new(100, 100), LayoutPolicy::default()).unwrap().complete(&icons);
        assert_eq!(pass.grid().unwrap().cells[0].caption, "mute");
    }

    #[test]
    fn picker_offers_one_option_per_name() {
        let pass = RenderPass::picker(3, Viewport::new(80, 48), &[(0, "Home"), (1, "Work")]);
        let View::Picker(options) = &pass.view else { panic!("expected picker") };
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].name, "Work");
        let rect = options[1].rect;
        let id = pass.hit(rect.x + 1, rect.y + 1).unwrap();
        assert_eq!(pass.handler(id), Some(&Handler::SelectConfig(1)));
        assert!(pass.grid().is_none());
    }

    #[test]
    fn auth_prompt_has_a_submit_button() {
        let pass = RenderPass::auth(1, Viewport::new(80, 48), None);
        let View::Auth { submit, .. } = &pass.view else { panic!("expected auth view") };
        let id = pass.hit(submit.x, submit.y).unwrap();
        assert_eq!(pass.handler(id), Some(&Handler::SubmitPassword));
    }
}
