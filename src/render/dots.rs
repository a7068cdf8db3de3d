use super::{Skin, SkinSize};

const DOT: char = '●';

/// A single dot marking the top of each bar.
#[derive(Debug, Clone)]
pub struct DotsSkin {
    size: SkinSize,
}

impl DotsSkin {
    pub fn new(size: SkinSize) -> Self {
        Self { size }
    }
}

impl Skin for DotsSkin {
    fn name(&self) -> &'static str {
        "dots"
    }

    fn render(&self, levels: &[f32]) -> Vec<String> {
        let height = self.size.height;
        let tops: Vec<Option<usize>> = levels
            .iter()
            .map(|&level| match self.size.bar_rows(level) {
                0 => None,
                rows => Some(height - rows),
            })
            .collect();

        (0..height)
            .map(|row| {
                tops.iter()
                    .map(|top| if *top == Some(row) { DOT } else { ' ' })
                    .collect()
            })
            .collect()
    }
}
