//! Scratch-to-reveal card logic, independent of any drawing API.
//!
//! The cover is modelled as an alpha grid. Pointer samples punch round holes into it and
//! consecutive samples of one gesture are joined with a capsule, so fast swipes leave no gaps.
//! The canvas in the UI only mirrors what happens here.

use serde::{Deserialize, Serialize};

/// Percentage of the cover that must be erased before the reward is revealed.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 60.0;

/// Brush radius in display pixels.
pub const DEFAULT_BRUSH_RADIUS: f64 = 30.0;

/// Backing pixels per display pixel.
pub const DEFAULT_PIXEL_RATIO: f64 = 2.0;

const OPAQUE: u8 = 255;
// A pixel counts as erased once its alpha is below half of opaque.
const VISIBLE_ALPHA: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoverTheme {
    #[default]
    Gold,
    Rose,
    Botanical,
}

impl CoverTheme {
    /// Gradient stops used to paint the cover, from top-left to bottom-right.
    pub fn gradient_stops(&self) -> [&'static str; 3] {
        match self {
            CoverTheme::Gold => ["hsl(43, 74%, 49%)", "hsl(340, 55%, 82%)", "hsl(43, 74%, 49%)"],
            CoverTheme::Rose => ["hsl(340, 55%, 82%)", "hsl(15, 80%, 75%)", "hsl(340, 55%, 82%)"],
            CoverTheme::Botanical => ["hsl(174, 42%, 40%)", "hsl(150, 35%, 75%)", "hsl(174, 42%, 40%)"],
        }
    }
}

/// Coverage grid backing a scratch surface.
#[derive(Debug, Clone)]
pub struct CoverageMask {
    width: usize,
    height: usize,
    alpha: Vec<u8>,
    erased: usize,
}

impl CoverageMask {
    /// Creates a fully opaque mask. Returns `None` for a zero-sized surface.
    pub fn new(width: usize, height: usize) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            width,
            height,
            alpha: vec![OPAQUE; width * height],
            erased: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Erases every pixel whose centre lies within `radius` of `(x, y)`.
    pub fn punch(&mut self, x: f64, y: f64, radius: f64) {
        self.stroke((x, y), (x, y), radius);
    }

    /// Erases every pixel whose centre lies within `radius` of the segment `from`-`to`.
    pub fn stroke(&mut self, from: (f64, f64), to: (f64, f64), radius: f64) {
        if radius <= 0.0 {
            return;
        }
        let (min_x, max_x) = (from.0.min(to.0) - radius, from.0.max(to.0) + radius);
        let (min_y, max_y) = (from.1.min(to.1) - radius, from.1.max(to.1) + radius);
        let Some((col_start, col_end)) = clamp_span(min_x, max_x, self.width) else {
            return;
        };
        let Some((row_start, row_end)) = clamp_span(min_y, max_y, self.height) else {
            return;
        };

        let radius_sq = radius * radius;
        for row in row_start..row_end {
            for col in col_start..col_end {
                let centre = (col as f64 + 0.5, row as f64 + 0.5);
                if distance_sq_to_segment(centre, from, to) <= radius_sq {
                    self.erase_pixel(row * self.width + col);
                }
            }
        }
    }

    /// Erases the whole mask.
    pub fn clear(&mut self) {
        for idx in 0..self.alpha.len() {
            self.erase_pixel(idx);
        }
    }

    /// Fraction of pixels in the buffer that are no longer visible, in `[0, 1]`.
    pub fn erased_fraction(&self) -> f64 {
        self.erased as f64 / self.alpha.len() as f64
    }

    pub fn erased_percent(&self) -> f64 {
        (self.erased * 100) as f64 / self.alpha.len() as f64
    }

    pub fn coverage_percent_remaining(&self) -> f64 {
        100.0 - self.erased_percent()
    }

    fn erase_pixel(&mut self, idx: usize) {
        if self.alpha[idx] >= VISIBLE_ALPHA {
            self.erased += 1;
        }
        self.alpha[idx] = 0;
    }
}

// Converts a continuous [min, max] range into the pixel index range that may intersect it.
fn clamp_span(min: f64, max: f64, len: usize) -> Option<(usize, usize)> {
    if max < 0.0 || min >= len as f64 {
        return None;
    }
    let start = min.floor().max(0.0) as usize;
    let end = (max.ceil().max(0.0) as usize + 1).min(len);
    (start < end).then_some((start, end))
}

fn distance_sq_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    (p.0 - cx).powi(2) + (p.1 - cy).powi(2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScratchPhase {
    Covered,
    Scratching,
    Revealed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScratchConfig {
    pub threshold_percent: f64,
    pub brush_radius: f64,
    pub pixel_ratio: f64,
    pub theme: CoverTheme,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            brush_radius: DEFAULT_BRUSH_RADIUS,
            pixel_ratio: DEFAULT_PIXEL_RATIO,
            theme: CoverTheme::default(),
        }
    }
}

/// What a pointer event did to the card. Callers mirror `Erased` onto their drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScratchEffect {
    Ignored,
    Erased {
        from: (f64, f64),
        to: (f64, f64),
        radius: f64,
    },
    Revealed,
}

/// A scratch card sized in display pixels. Coordinates passed in are display pixels relative to
/// the top-left corner of the card.
pub struct ScratchCard {
    config: ScratchConfig,
    mask: CoverageMask,
    phase: ScratchPhase,
    last_point: Option<(f64, f64)>,
    on_complete: Option<Box<dyn FnOnce()>>,
}

impl ScratchCard {
    /// Returns `None` when the surface has no area yet; callers retry after the next layout.
    pub fn new(
        display_width: f64,
        display_height: f64,
        config: ScratchConfig,
        on_complete: impl FnOnce() + 'static,
    ) -> Option<Self> {
        let ratio = if config.pixel_ratio > 0.0 {
            config.pixel_ratio
        } else {
            1.0
        };
        let width = (display_width * ratio).round().max(0.0) as usize;
        let height = (display_height * ratio).round().max(0.0) as usize;
        let mask = CoverageMask::new(width, height)?;
        Some(Self {
            config: ScratchConfig {
                pixel_ratio: ratio,
                ..config
            },
            mask,
            phase: ScratchPhase::Covered,
            last_point: None,
            on_complete: Some(Box::new(on_complete)),
        })
    }

    pub fn phase(&self) -> ScratchPhase {
        self.phase
    }

    pub fn config(&self) -> &ScratchConfig {
        &self.config
    }

    pub fn is_interactive(&self) -> bool {
        self.phase != ScratchPhase::Revealed
    }

    pub fn erased_percent(&self) -> f64 {
        self.mask.erased_percent()
    }

    pub fn mask(&self) -> &CoverageMask {
        &self.mask
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> ScratchEffect {
        if self.phase == ScratchPhase::Revealed {
            return ScratchEffect::Ignored;
        }
        self.phase = ScratchPhase::Scratching;
        self.last_point = Some((x, y));
        self.erase((x, y), (x, y))
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> ScratchEffect {
        if self.phase != ScratchPhase::Scratching {
            return ScratchEffect::Ignored;
        }
        let from = self.last_point.unwrap_or((x, y));
        self.last_point = Some((x, y));
        self.erase(from, (x, y))
    }

    /// Ends the gesture. Progress is kept.
    pub fn pointer_up(&mut self) {
        if self.phase == ScratchPhase::Scratching {
            self.phase = ScratchPhase::Covered;
        }
        self.last_point = None;
    }

    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    fn erase(&mut self, from: (f64, f64), to: (f64, f64)) -> ScratchEffect {
        let ratio = self.config.pixel_ratio;
        let radius = self.config.brush_radius * ratio;
        self.mask
            .stroke((from.0 * ratio, from.1 * ratio), (to.0 * ratio, to.1 * ratio), radius);

        if self.mask.erased_percent() > self.config.threshold_percent {
            self.reveal();
            return ScratchEffect::Revealed;
        }
        ScratchEffect::Erased {
            from,
            to,
            radius: self.config.brush_radius,
        }
    }

    fn reveal(&mut self) {
        if self.phase == ScratchPhase::Revealed {
            return;
        }
        self.phase = ScratchPhase::Revealed;
        self.last_point = None;
        self.mask.clear();
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
    }
}
