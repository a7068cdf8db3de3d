use super::{Skin, SkinSize};

const FULL: char = '█';

/// Solid vertical bars, one column per band.
#[derive(Debug, Clone)]
pub struct BlocksSkin {
    size: SkinSize,
}

impl BlocksSkin {
    pub fn new(size: SkinSize) -> Self {
        Self { size }
    }
}

impl Skin for BlocksSkin {
    fn name(&self) -> &'static str {
        "blocks"
    }

    fn render(&self, levels: &[f32]) -> Vec<String> {
        (0..self.size.height)
            .map(|row| {
                levels
                    .iter()
                    .map(|&level| if self.size.is_lit(row, level) { FULL } else { ' ' })
                    .collect()
            })
            .collect()
    }
}
