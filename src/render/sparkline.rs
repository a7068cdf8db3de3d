use super::{Skin, SkinSize};

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One row of eighth-block glyphs across the middle of the area.
#[derive(Debug, Clone)]
pub struct SparklineSkin {
    size: SkinSize,
}

impl SparklineSkin {
    pub fn new(size: SkinSize) -> Self {
        Self { size }
    }
}

fn glyph(level: f32) -> char {
    let idx = (level.clamp(0.0, 1.0) * LEVELS.len() as f32) as usize;
    LEVELS[idx.min(LEVELS.len() - 1)]
}

impl Skin for SparklineSkin {
    fn name(&self) -> &'static str {
        "sparkline"
    }

    fn render(&self, levels: &[f32]) -> Vec<String> {
        let middle = self.size.height / 2;
        (0..self.size.height)
            .map(|row| {
                if row == middle {
                    levels.iter().map(|&l| glyph(l)).collect()
                } else {
                    " ".repeat(levels.len())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_middle_row() {
        let skin = SparklineSkin::new(SkinSize::new(3, 3));
        let lines = skin.render(&[0.0, 0.5, 1.0]);
        assert_eq!(lines, vec!["   ", "▁▅█", "   "]);
    }
}
