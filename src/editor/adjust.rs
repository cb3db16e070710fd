/// Non-destructive tone adjustments for the editor preview and final export.
///
/// `brightness` and `contrast` are percentages with 100 as identity; the
/// remaining eight knobs are signed offsets with 0 as identity. The same
/// record drives the live preview filter and the full-resolution export
/// composite, so both render identically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustments {
    pub brightness: f32,
    pub contrast: f32,
    pub exposure: f32,
    pub highlights: f32,
    pub shadows: f32,
    pub whites: f32,
    pub blacks: f32,
    pub texture: f32,
    pub clarity: f32,
    pub dehaze: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Adjustments {
            brightness: 100.0,
            contrast: 100.0,
            exposure: 0.0,
            highlights: 0.0,
            shadows: 0.0,
            whites: 0.0,
            blacks: 0.0,
            texture: 0.0,
            clarity: 0.0,
            dehaze: 0.0,
        }
    }
}

impl Adjustments {
    /// One-click auto look. Only the five listed knobs move; anything the
    /// user already set elsewhere stays put.
    pub fn apply_auto(&mut self) {
        self.brightness = 105.0;
        self.contrast = 110.0;
        self.exposure = 5.0;
        self.clarity = 10.0;
        self.dehaze = 5.0;
    }

    pub fn reset(&mut self) {
        *self = Adjustments::default();
    }
}

/// Brightness/contrast pair actually applied by the rendering layer,
/// expressed as CSS-style percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveFilter {
    pub brightness_pct: f32,
    pub contrast_pct: f32,
}

impl EffectiveFilter {
    /// CSS-equivalent string for display surfaces.
    pub fn to_css(&self) -> String {
        format!(
            "brightness({}%) contrast({}%)",
            self.brightness_pct, self.contrast_pct
        )
    }
}

/// Collapses the ten knobs into the two-channel transform the raster layer
/// understands. `highlights`, `shadows`, `whites`, `blacks` and `texture`
/// are stored but do not enter the mapping; see DESIGN.md. No clamping here
/// either; out-of-range percentages are the renderer's problem.
pub fn effective_filter(adj: &Adjustments) -> EffectiveFilter {
    EffectiveFilter {
        brightness_pct: adj.brightness + adj.exposure - 0.1 * adj.dehaze,
        contrast_pct: adj.contrast + 0.2 * adj.clarity + 0.2 * adj.dehaze,
    }
}
