//! Paints render passes into the terminal buffer.
//!
//! Layout units map to one column horizontally and half a row vertically,
//! so icons are drawn with half-block pixels at their native resolution.

use crate::colors::{css_or, dim, is_zero_length, parse_css_color};
use crate::dispatch::{ButtonState, CooldownMap};
use crate::render::{CellWidget, GridView, MessageKind, PickerOption, Rect, RenderPass, View, WidgetId};
use crate::style::{IconStyle, Label, DEFAULT_ACTIVE, DEFAULT_BG, DEFAULT_FG};
use crate::terminal::Terminal;
use crossterm::style::Color;
use image::RgbaImage;
use std::collections::HashMap;

/// Alpha threshold below which a pixel is considered transparent
const ALPHA_THRESHOLD: u8 = 10;

const ERROR_COLOR: Color = Color::Rgb { r: 230, g: 80, b: 80 };
const MUTED_COLOR: Color = Color::Grey;
const PLACEHOLDER_COLOR: Color = Color::DarkGrey;

/// What the status bar and prompt need besides the pass itself
pub struct Overlay<'a> {
    pub pressed: Option<WidgetId>,
    pub input_len: usize,
    pub status: &'a str,
    pub help: Option<&'a str>,
}

/// Terminal-space rectangle (columns and rows)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Area {
    x: i32,
    y: i32,
    width: u16,
    height: u16,
}

impl Area {
    /// Rows covered by a layout rect; at least one when the rect has height
    fn from_layout(rect: Rect) -> Self {
        let top = rect.y / 2;
        let bottom = (rect.y + rect.height).div_ceil(2);
        let height = bottom.saturating_sub(top).max(u32::from(rect.height > 0));
        Area {
            x: rect.x as i32,
            y: top as i32,
            width: rect.width.min(u16::MAX as u32) as u16,
            height: height.min(u16::MAX as u32) as u16,
        }
    }

    fn inner(&self) -> Area {
        Area {
            x: self.x + 1,
            y: self.y + 1,
            width: self.width.saturating_sub(2),
            height: self.height.saturating_sub(2),
        }
    }
}

/// Keeps resized icon bitmaps between frames.
#[derive(Default)]
pub struct Painter {
    generation: u64,
    icons: HashMap<(usize, u32, u32), RgbaImage>,
}

impl Painter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, term: &mut Terminal, pass: &RenderPass, overlay: &Overlay<'_>) {
        if pass.generation != self.generation {
            self.icons.clear();
            self.generation = pass.generation;
        }

        let page_bg = match &pass.view {
            View::Grid(grid) => grid.background.as_deref().and_then(parse_css_color),
            _ => None,
        };
        term.clear(page_bg);

        match &pass.view {
            View::Empty => {}
            View::Message { kind, text } => draw_message(term, *kind, text),
            View::Auth { error, submit } => draw_auth(term, error.as_deref(), *submit, overlay),
            View::Picker(options) => draw_picker(term, options, overlay.pressed),
            View::Grid(grid) => self.draw_grid(term, grid, &pass.cooldowns, overlay.pressed),
        }

        draw_status(term, overlay.status);
        if let Some(help) = overlay.help {
            draw_help_overlay(term, help);
        }
    }

    fn draw_grid(&mut self, term: &mut Terminal, grid: &GridView, cooldowns: &CooldownMap, pressed: Option<WidgetId>) {
        for rect in &grid.placeholders {
            draw_frame(term, Area::from_layout(*rect), PLACEHOLDER_COLOR, None, true);
        }

        for (id, cell) in grid.cells.iter().enumerate() {
            let cooling = cooldowns.state(cell.button) == Some(ButtonState::Cooling);
            let base = if pressed == Some(id) {
                css_or(&cell.style.active, DEFAULT_BG)
            } else {
                css_or(&cell.style.bg, DEFAULT_BG)
            };
            let bg = if cooling { dim(base) } else { base };
            let fg = css_or(&cell.style.fg, DEFAULT_FG);
            self.draw_button(term, cell, fg, bg);
        }
    }

    fn draw_button(&mut self, term: &mut Terminal, cell: &CellWidget, fg: Color, bg: Color) {
        let area = Area::from_layout(cell.face);
        let rounded = !is_zero_length(&cell.style.radius);
        term.fill(area.x, area.y, area.width, area.height, Some(bg));
        if area.width >= 2 && area.height >= 2 {
            draw_frame(term, area, fg, Some(bg), rounded);
        }

        let inner = if area.height >= 3 { area.inner() } else { area };
        match (&cell.style.label, &cell.icon) {
            (Label::Icon(style), Some(icon)) => {
                let (w, h) = icon_pixels(style, inner);
                if w == 0 || h == 0 {
                    return;
                }
                let rgba = self
                    .icons
                    .entry((cell.button.index, w, h))
                    .or_insert_with(|| {
                        let mut rgba = icon
                            .resize_exact(w, h, image::imageops::FilterType::Triangle)
                            .to_rgba8();
                        if !is_zero_length(&style.radius) {
                            clip_corners(&mut rgba);
                        }
                        rgba
                    });
                let x = inner.x + (inner.width as i32 - w as i32) / 2;
                let y = inner.y + (inner.height as i32 * 2 - h as i32) / 4;
                render_halfblock(term, rgba, x, y, bg);
            }
            _ => {
                if let Some(text) = face_text(cell) {
                    draw_centered(term, inner, text, fg, true);
                }
            }
        }
    }
}

/// Text for a face that shows no bitmap. An icon that exists but could not
/// be decoded falls back to the caption.
fn face_text(cell: &CellWidget) -> Option<&str> {
    match (&cell.style.label, &cell.icon) {
        (Label::Icon(_), Some(_)) => None,
        (Label::Icon(_), None) => Some(&cell.caption),
        (Label::Text(text), _) => Some(text),
    }
}

/// Icon bitmap size for an `img-width`/`img-height` pair inside `area`.
fn icon_pixels(style: &IconStyle, area: Area) -> (u32, u32) {
    let width = css_extent(&style.width, area.width as u32);
    let height = css_extent(&style.height, area.height as u32 * 2);
    (width, height)
}

/// Resolve a CSS length against `full`: percentages scale, plain and `px`
/// values are taken as layout units, anything else means `full`.
fn css_extent(value: &str, full: u32) -> u32 {
    let value = value.trim();
    let parsed = if let Some(pct) = value.strip_suffix('%') {
        pct.trim().parse::<f64>().ok().map(|p| full as f64 * p / 100.0)
    } else {
        value.trim_end_matches("px").trim().parse::<f64>().ok()
    };
    match parsed {
        Some(v) if v.is_finite() && v > 0.0 => (v.round() as u32).min(full),
        Some(_) => 0,
        None => full,
    }
}

/// Knock out the corner pixels so rounded icons do not show square edges
fn clip_corners(rgba: &mut RgbaImage) {
    let (w, h) = rgba.dimensions();
    if w < 4 || h < 4 {
        return;
    }
    for (x, y) in [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)] {
        rgba.get_pixel_mut(x, y).0[3] = 0;
    }
}

/// Draw an RGBA bitmap with half blocks, blending transparent pixels into `bg`.
fn render_halfblock(term: &mut Terminal, rgba: &RgbaImage, x: i32, y: i32, bg: Color) {
    let pixel = |px: u32, py: u32| -> Option<Color> {
        if py >= rgba.height() {
            return None;
        }
        let [r, g, b, a] = rgba.get_pixel(px, py).0;
        (a >= ALPHA_THRESHOLD).then_some(Color::Rgb { r, g, b })
    };

    for cy in 0..rgba.height().div_ceil(2) {
        for cx in 0..rgba.width() {
            let tx = x + cx as i32;
            let ty = y + cy as i32;
            match (pixel(cx, cy * 2), pixel(cx, cy * 2 + 1)) {
                (None, None) => {}
                (None, Some(bot)) => term.set_with_bg(tx, ty, '▄', Some(bot), Some(bg), false),
                (Some(top), None) => term.set_with_bg(tx, ty, '▀', Some(top), Some(bg), false),
                (Some(top), Some(bot)) => term.set_with_bg(tx, ty, '▀', Some(top), Some(bot), false),
            }
        }
    }
}

fn draw_frame(term: &mut Terminal, area: Area, fg: Color, bg: Option<Color>, rounded: bool) {
    if area.width < 2 || area.height < 2 {
        return;
    }
    let (tl, tr, bl, br) = if rounded { ('╭', '╮', '╰', '╯') } else { ('┌', '┐', '└', '┘') };
    let right = area.x + area.width as i32 - 1;
    let bottom = area.y + area.height as i32 - 1;

    let mut put = |x: i32, y: i32, ch: char| match bg {
        Some(bg) => term.set_with_bg(x, y, ch, Some(fg), Some(bg), false),
        None => term.set(x, y, ch, Some(fg), false),
    };

    put(area.x, area.y, tl);
    put(right, area.y, tr);
    put(area.x, bottom, bl);
    put(right, bottom, br);
    for x in area.x + 1..right {
        put(x, area.y, '─');
        put(x, bottom, '─');
    }
    for y in area.y + 1..bottom {
        put(area.x, y, '│');
        put(right, y, '│');
    }
}

/// Centre one line of text in `area`, truncating to fit
fn draw_centered(term: &mut Terminal, area: Area, text: &str, fg: Color, bold: bool) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let text: String = text.chars().take(area.width as usize).collect();
    let x = area.x + (area.width as i32 - text.chars().count() as i32) / 2;
    let y = area.y + (area.height as i32 - 1) / 2;
    term.set_str(x, y, &text, Some(fg), bold);
}

fn center_line(term: &mut Terminal, y: i32, text: &str, fg: Color, bold: bool) {
    let (width, _) = term.size();
    draw_centered(term, Area { x: 0, y, width, height: 1 }, text, fg, bold);
}

fn draw_message(term: &mut Terminal, kind: MessageKind, text: &str) {
    let (width, height) = term.size();
    let color = match kind {
        MessageKind::Error => ERROR_COLOR,
        MessageKind::Info => MUTED_COLOR,
    };
    let lines = wrap(text, (width as usize).saturating_sub(4).max(1));
    let top = (height as i32 - lines.len() as i32) / 2;
    for (i, line) in lines.iter().enumerate() {
        center_line(term, top + i as i32, line, color, kind == MessageKind::Error);
    }
}

fn draw_auth(term: &mut Terminal, error: Option<&str>, submit: Rect, overlay: &Overlay<'_>) {
    let button = Area::from_layout(submit);
    let input_row = button.y - 2;

    center_line(term, input_row - 2, "Password required", Color::White, true);
    let masked: String = "*".repeat(overlay.input_len);
    center_line(term, input_row, &format!("Password: {}_", masked), Color::White, false);
    if let Some(error) = error {
        center_line(term, input_row - 1, error, ERROR_COLOR, false);
    }

    let pressed = overlay.pressed.is_some();
    let bg = css_or(if pressed { DEFAULT_ACTIVE } else { DEFAULT_BG }, DEFAULT_BG);
    term.fill(button.x, button.y, button.width, button.height, Some(bg));
    draw_frame(term, button, Color::White, Some(bg), true);
    draw_centered(term, button.inner(), "Submit", Color::White, true);
}

fn draw_picker(term: &mut Terminal, options: &[PickerOption], pressed: Option<WidgetId>) {
    if let Some(first) = options.first() {
        let top = Area::from_layout(first.rect).y;
        center_line(term, top - 2, "Select a configuration", Color::White, true);
    }

    for (id, option) in options.iter().enumerate() {
        let area = Area::from_layout(option.rect);
        let bg = if pressed == Some(id) {
            css_or(DEFAULT_ACTIVE, DEFAULT_BG)
        } else {
            css_or(DEFAULT_BG, DEFAULT_BG)
        };
        term.fill(area.x, area.y, area.width, area.height, Some(bg));
        draw_frame(term, area, Color::White, Some(bg), true);
        let label = if id < 9 { format!("{}  {}", id + 1, option.name) } else { option.name.clone() };
        draw_centered(term, area.inner(), &label, Color::White, false);
    }
}

fn draw_status(term: &mut Terminal, status: &str) {
    let (width, height) = term.size();
    if height == 0 {
        return;
    }
    let y = height as i32 - 1;
    term.fill(0, y, width, 1, Some(Color::Rgb { r: 30, g: 30, b: 30 }));
    let text: String = status.chars().take(width as usize).collect();
    term.set_str(0, y, &text, Some(MUTED_COLOR), false);
}

/// Centered help box drawn over whatever is below it.
fn draw_help_overlay(term: &mut Terminal, help_text: &str) {
    let (width, height) = term.size();
    let lines: Vec<&str> = help_text.lines().collect();
    let max_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_width = max_width + 4; // 2 chars padding each side
    let box_height = lines.len() + 2;

    let area = Area {
        x: ((width as usize).saturating_sub(box_width) / 2) as i32,
        y: ((height as usize).saturating_sub(box_height) / 2) as i32,
        width: box_width as u16,
        height: box_height as u16,
    };
    let bg = Some(Color::Black);
    term.fill(area.x, area.y, area.width, area.height, bg);
    draw_frame(term, area, Color::White, bg, false);

    for (i, line) in lines.iter().enumerate() {
        term.set_str(area.x + 2, area.y + 1 + i as i32, line, Some(MUTED_COLOR), false);
    }
}

/// Greedy word wrap
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() { word.chars().count() } else { current.chars().count() + 1 + word.chars().count() };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
