//! Terminal skins: pure functions from normalised band levels to text lines.

mod blocks;
mod dots;
mod fire;
mod gradient;
mod rainbow;
mod sparkline;

pub use blocks::BlocksSkin;
pub use dots::DotsSkin;
pub use fire::FireSkin;
pub use gradient::GradientSkin;
pub use rainbow::RainbowSkin;
pub use sparkline::SparklineSkin;

use crossterm::style::{Color, Stylize};
use std::borrow::Cow;

pub const DEFAULT_SKIN: &str = "blocks";

/// Output area of a skin, in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinSize {
    pub height: usize,
    pub bands: usize,
}

impl SkinSize {
    pub fn new(height: usize, bands: usize) -> Self {
        Self {
            height: height.max(1),
            bands,
        }
    }

    /// Number of lit rows for a level in `[0, 1]`.
    pub fn bar_rows(&self, level: f32) -> usize {
        ((level.clamp(0.0, 1.0) * self.height as f32) as usize).min(self.height)
    }

    /// Whether `row` (0 = top) falls inside the bar for `level`.
    pub fn is_lit(&self, row: usize, level: f32) -> bool {
        row >= self.height - self.bar_rows(level)
    }
}

/// A visual variant. Receives `num_bands` levels in `[0, 1]` and returns
/// exactly `height` lines, top first.
pub trait Skin {
    fn name(&self) -> &'static str;
    fn render(&self, levels: &[f32]) -> Vec<String>;
}

pub type SkinFactory = fn(SkinSize) -> Box<dyn Skin>;

/// Name -> constructor table for skins.
#[derive(Clone)]
pub struct SkinRegistry {
    entries: Vec<(&'static str, SkinFactory)>,
}

impl std::fmt::Debug for SkinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Default for SkinRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SkinRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("blocks", |size| boxed(BlocksSkin::new(size)));
        registry.register("dots", |size| boxed(DotsSkin::new(size)));
        registry.register("gradient", |size| boxed(GradientSkin::new(size)));
        registry.register("sparkline", |size| boxed(SparklineSkin::new(size)));
        registry.register("fire", |size| boxed(FireSkin::new(size)));
        registry.register("rainbow", |size| boxed(RainbowSkin::new(size)));
        registry
    }

    /// Add or replace a skin under `name`.
    pub fn register(&mut self, name: &'static str, factory: SkinFactory) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| *existing == name)
    }

    pub fn create(&self, name: &str, size: SkinSize) -> Option<Box<dyn Skin>> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, factory)| factory(size))
    }
}

fn boxed<S: Skin + 'static>(skin: S) -> Box<dyn Skin> {
    Box::new(skin)
}

pub(crate) fn paint(glyph: &str, color: Color) -> String {
    glyph.with(color).to_string()
}

const ESC: char = '\u{1b}';
const RESET: &str = "\u{1b}[0m";

/// Cut a rendered line to `columns` visible cells. Escape sequences do not
/// count towards the width; a cut line that carried any ends with a reset so
/// colour does not bleed into the next row.
pub fn clip_line(line: &str, columns: usize) -> Cow<'_, str> {
    let mut visible = 0;
    let mut styled = false;
    let mut chars = line.char_indices();
    while let Some((idx, c)) = chars.next() {
        if c == ESC {
            styled = true;
            for (_, next) in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        if visible == columns {
            let mut clipped = line[..idx].to_string();
            if styled {
                clipped.push_str(RESET);
            }
            return Cow::Owned(clipped);
        }
        visible += 1;
    }
    Cow::Borrowed(line)
}
