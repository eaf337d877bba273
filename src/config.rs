use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::error::Error;
use crate::geometry::{Point, Rect};
use crate::processing::color::Argb;
use crate::processing::layout::DEFAULT_DOWNSAMPLE_FACTOR;
use crate::render::backend::Compositor;
use crate::render::host::{SourceRegion, TargetRegion};

/// Radius used when a configuration does not name one.
pub const DEFAULT_BLUR_RADIUS: f32 = 16.0;
/// Radius used by the overlay fallback setup and indicator configure paths.
pub const FALLBACK_BLUR_RADIUS: f32 = 20.0;
pub const MIN_BLUR_RADIUS: f32 = 2.0;
pub const MAX_BLUR_RADIUS: f32 = 25.0;

/// Clamp a requested radius into the range the controllers honor.
pub fn clamp_radius(radius: f32) -> f32 {
    if radius.is_nan() {
        return MIN_BLUR_RADIUS;
    }
    radius.clamp(MIN_BLUR_RADIUS, MAX_BLUR_RADIUS)
}

/// Tunables shared by every blur surface.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BlurOptions {
    /// Clip the blurred content to the target's outline.
    pub clip_to_boundary: bool,
    pub blur_radius: f32,
    /// Flat color composited over the blur; `None` draws the blur alone.
    pub overlay_color: Option<Argb>,
    /// Fall back to a software blur when no compositor blur exists.
    pub fallback_enabled: bool,
    /// Ratio between the target size and the captured snapshot.
    pub downsample_factor: f32,
}

impl BlurOptions {
    const fn default_blur_radius() -> f32 {
        DEFAULT_BLUR_RADIUS
    }

    const fn default_fallback_enabled() -> bool {
        true
    }

    const fn default_downsample_factor() -> f32 {
        DEFAULT_DOWNSAMPLE_FACTOR
    }

    /// Parse and validate a standalone `blur` options document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.blur_radius.is_finite() {
            return Err(Error::InvalidOption(format!(
                "blur-radius must be finite, got {}",
                self.blur_radius
            )));
        }
        if !(self.downsample_factor.is_finite() && self.downsample_factor > 0.0) {
            return Err(Error::InvalidOption(format!(
                "downsample-factor must be positive, got {}",
                self.downsample_factor
            )));
        }
        Ok(())
    }

    /// Overlay color with "none" folded into transparent.
    pub fn overlay(&self) -> Argb {
        self.overlay_color.unwrap_or(Argb::TRANSPARENT)
    }
}

impl Default for BlurOptions {
    fn default() -> Self {
        Self {
            clip_to_boundary: false,
            blur_radius: Self::default_blur_radius(),
            overlay_color: None,
            fallback_enabled: Self::default_fallback_enabled(),
            downsample_factor: Self::default_downsample_factor(),
        }
    }
}

/// Everything a render controller needs: the two regions, the options and
/// the host's compositor capability, if any.
#[derive(Clone)]
pub struct BlurConfig {
    pub source_region: Rc<dyn SourceRegion>,
    pub target_region: Rc<dyn TargetRegion>,
    pub options: BlurOptions,
    pub compositor: Option<Rc<dyn Compositor>>,
}

impl fmt::Debug for BlurConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlurConfig")
            .field("source", &self.source_region.bounds())
            .field("target", &self.target_region.bounds())
            .field("options", &self.options)
            .field("compositor", &self.compositor.is_some())
            .finish()
    }
}

impl BlurConfig {
    pub fn builder() -> BlurConfigBuilder {
        BlurConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct BlurConfigBuilder {
    source_region: Option<Rc<dyn SourceRegion>>,
    target_region: Option<Rc<dyn TargetRegion>>,
    options: BlurOptions,
    compositor: Option<Rc<dyn Compositor>>,
}

impl BlurConfigBuilder {
    pub fn source_region(mut self, source: Rc<dyn SourceRegion>) -> Self {
        self.source_region = Some(source);
        self
    }

    pub fn target_region(mut self, target: Rc<dyn TargetRegion>) -> Self {
        self.target_region = Some(target);
        self
    }

    pub fn options(mut self, options: BlurOptions) -> Self {
        self.options = options;
        self
    }

    pub fn blur_radius(mut self, radius: f32) -> Self {
        self.options.blur_radius = radius;
        self
    }

    pub fn overlay_color(mut self, color: Argb) -> Self {
        self.options.overlay_color = Some(color);
        self
    }

    pub fn clip_to_boundary(mut self, clip: bool) -> Self {
        self.options.clip_to_boundary = clip;
        self
    }

    pub fn fallback_enabled(mut self, enabled: bool) -> Self {
        self.options.fallback_enabled = enabled;
        self
    }

    pub fn compositor(mut self, compositor: Rc<dyn Compositor>) -> Self {
        self.compositor = Some(compositor);
        self
    }

    pub fn build(self) -> Result<BlurConfig, Error> {
        let source_region = self
            .source_region
            .ok_or(Error::MissingRegion("source region"))?;
        let target_region = self
            .target_region
            .ok_or(Error::MissingRegion("target region"))?;
        self.options.validate()?;
        Ok(BlurConfig {
            source_region,
            target_region,
            options: self.options,
            compositor: self.compositor,
        })
    }
}

/// Scene file read by the `backdrop-blur` binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    /// PNG rendered as the source subtree.
    pub source_image: PathBuf,
    /// Screen position of the source image's top-left corner.
    #[serde(default)]
    pub source_origin: Point,
    /// Screen rectangle the frosted panel covers.
    pub target_region: Rect,
    #[serde(default)]
    pub blur: BlurOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene file {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.source_image.as_os_str().is_empty(),
            "source-image must name a PNG file"
        );
        ensure!(
            !self.target_region.is_empty(),
            "target-region must have a non-zero width and height"
        );
        self.blur.validate().context("invalid blur configuration")?;
        Ok(self)
    }
}
