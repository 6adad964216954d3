//! Color spaces and color values carried by the graphics state.

use std::sync::Arc;

/// A resolved PDF color space.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    CalGray,
    CalRgb,
    Lab,
    /// ICC profile with `components` channels. `alternate` is used when the
    /// profile itself cannot be evaluated.
    IccBased {
        components: usize,
        alternate: Box<ColorSpace>,
    },
    /// Palette color space: one index selects `base` components from `lookup`.
    Indexed {
        base: Box<ColorSpace>,
        hival: u32,
        /// `(hival + 1) * base.components()` bytes.
        lookup: Arc<[u8]>,
    },
    /// Single spot colorant.
    Separation {
        colorant: String,
        alternate: Box<ColorSpace>,
    },
    DeviceN {
        colorants: Vec<String>,
        alternate: Box<ColorSpace>,
    },
    /// Pattern color space; uncolored patterns carry the space of their tint.
    Pattern { underlying: Option<Box<ColorSpace>> },
}

impl ColorSpace {
    /// Map the family name used by `CS`/`cs` and color-space arrays,
    /// including the abbreviations allowed in inline images.
    pub fn from_device_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" | "G" => Some(ColorSpace::DeviceGray),
            "DeviceRGB" | "RGB" => Some(ColorSpace::DeviceRgb),
            "DeviceCMYK" | "CMYK" => Some(ColorSpace::DeviceCmyk),
            "Pattern" => Some(ColorSpace::Pattern { underlying: None }),
            _ => None,
        }
    }

    /// Device space implied by a bare component count.
    pub fn from_component_count(n: usize) -> Option<Self> {
        match n {
            1 => Some(ColorSpace::DeviceGray),
            3 => Some(ColorSpace::DeviceRgb),
            4 => Some(ColorSpace::DeviceCmyk),
            _ => None,
        }
    }

    /// Number of operands a color in this space takes.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => 1,
            ColorSpace::DeviceRgb | ColorSpace::CalRgb | ColorSpace::Lab => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::IccBased { components, .. } => *components,
            ColorSpace::Indexed { .. } | ColorSpace::Separation { .. } => 1,
            ColorSpace::DeviceN { colorants, .. } => colorants.len(),
            ColorSpace::Pattern { underlying } => {
                underlying.as_ref().map_or(0, |base| base.components())
            }
        }
    }

    /// Color installed when this space is selected with `CS`/`cs`.
    pub fn initial_color(&self) -> Color {
        match self {
            ColorSpace::DeviceCmyk => Color::new(vec![0.0, 0.0, 0.0, 1.0]),
            ColorSpace::Separation { .. } | ColorSpace::DeviceN { .. } => {
                Color::new(vec![1.0; self.components()])
            }
            ColorSpace::Pattern { .. } => Color::new(Vec::new()),
            _ => Color::new(vec![0.0; self.components()]),
        }
    }

    /// Family name as written in a PDF file.
    pub fn family(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
            ColorSpace::DeviceCmyk => "DeviceCMYK",
            ColorSpace::CalGray => "CalGray",
            ColorSpace::CalRgb => "CalRGB",
            ColorSpace::Lab => "Lab",
            ColorSpace::IccBased { .. } => "ICCBased",
            ColorSpace::Indexed { .. } => "Indexed",
            ColorSpace::Separation { .. } => "Separation",
            ColorSpace::DeviceN { .. } => "DeviceN",
            ColorSpace::Pattern { .. } => "Pattern",
        }
    }

    /// Best-effort conversion to RGB for previews and traces.
    ///
    /// Tint transforms and ICC profiles are not evaluated; their alternate
    /// spaces stand in. Returns `None` for Lab and pattern colors.
    pub fn to_rgb(&self, components: &[f32]) -> Option<[f32; 3]> {
        let c = |i: usize| components.get(i).copied().unwrap_or(0.0);
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => Some([c(0); 3]),
            ColorSpace::DeviceRgb | ColorSpace::CalRgb => Some([c(0), c(1), c(2)]),
            ColorSpace::DeviceCmyk => {
                let k = c(3);
                Some([
                    (1.0 - c(0)) * (1.0 - k),
                    (1.0 - c(1)) * (1.0 - k),
                    (1.0 - c(2)) * (1.0 - k),
                ])
            }
            ColorSpace::IccBased { alternate, .. } => alternate.to_rgb(components),
            ColorSpace::Indexed { base, hival, lookup } => {
                let index = (c(0).max(0.0) as u32).min(*hival) as usize;
                let n = base.components();
                let entry = lookup.get(index * n..index * n + n)?;
                let base_components: Vec<f32> = entry.iter().map(|&b| f32::from(b) / 255.0).collect();
                base.to_rgb(&base_components)
            }
            ColorSpace::Separation { alternate, .. } => {
                // Approximate the tint transform: full tint is full ink.
                let tint = c(0);
                match alternate.as_ref() {
                    ColorSpace::DeviceCmyk => ColorSpace::DeviceCmyk.to_rgb(&[0.0, 0.0, 0.0, tint]),
                    _ => Some([1.0 - tint; 3]),
                }
            }
            ColorSpace::DeviceN { alternate, .. } => {
                if components.len() == alternate.components() {
                    alternate.to_rgb(components)
                } else {
                    None
                }
            }
            ColorSpace::Lab | ColorSpace::Pattern { .. } => None,
        }
    }
}

/// A color value: components in the current space, plus the pattern name
/// when the space is `Pattern`.
#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    /// Components are replaced wholesale, so saved states share them.
    pub components: Arc<[f32]>,
    pub pattern: Option<String>,
}

impl Color {
    pub fn new(components: Vec<f32>) -> Self {
        Self {
            components: components.into(),
            pattern: None,
        }
    }

    pub fn with_pattern(components: Vec<f32>, pattern: impl Into<String>) -> Self {
        Self {
            components: components.into(),
            pattern: Some(pattern.into()),
        }
    }

    /// Black in DeviceGray.
    pub fn black() -> Self {
        Self::new(vec![0.0])
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}
