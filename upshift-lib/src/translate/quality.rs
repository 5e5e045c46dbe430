//! Quality-mode ratios, preset buckets and the jitter sequence.

use log::debug;
use upshift_common::{Config, ngx::PerfQuality};

/// Ratios for NativeAA, Quality, Balanced, Performance and UltraPerformance, indexed by quality mode.
pub const DEFAULT_RATIOS: [f32; 5] = [1.0, 1.5, 1.7, 2.0, 3.0];

const DEFAULT_JITTER_PHASE_BASE: f32 = 8.0;

#[derive(Clone, Debug, PartialEq)]
pub struct QualityTable {
  floor: f32,
  global: Option<f32>,
  per_mode: Option<[f32; 5]>
}

impl Default for QualityTable {
  fn default() -> Self {
    Self {
      floor: 1.0,
      global: None,
      per_mode: None
    }
  }
}

impl QualityTable {
  pub fn from_config(config: &Config) -> Self {
    let per_mode = config.quality_ratio_override_enabled.value_or(false).then(|| {
      [
        config.quality_ratio_dlaa.value_or(1.0),
        config.quality_ratio_quality.value_or(1.5),
        config.quality_ratio_balanced.value_or(1.7),
        config.quality_ratio_performance.value_or(2.0),
        config.quality_ratio_ultra_performance.value_or(3.0)
      ]
    });

    Self {
      floor: if config.extended_limits.value_or(false) { 0.1 } else { 1.0 },
      global: config
        .upscale_ratio_override_enabled
        .value_or(false)
        .then(|| config.upscale_ratio_override_value.value_or(1.3)),
      per_mode
    }
  }

  /// The configured ratio for `mode`, if an override at or above the floor applies.
  pub fn override_ratio(&self, mode: u32) -> Option<f32> {
    if let Some(global) = self.global
      && global >= self.floor
    {
      return Some(global);
    }

    let ratio = self.per_mode?.get(mode as usize).copied()?;
    (ratio >= self.floor).then_some(ratio)
  }

  /// `None` for a quality mode outside the known set.
  pub fn ratio(&self, mode: u32) -> Option<f32> {
    let fallback = DEFAULT_RATIOS.get(mode as usize).copied()?;
    let ratio = self.override_ratio(mode).unwrap_or(fallback);
    debug!("Quality mode: {}, ratio: {}", mode, ratio);
    Some(ratio)
  }
}

pub fn render_resolution(display_width: u32, display_height: u32, ratio: f32) -> (u32, u32) {
  (
    (display_width as f32 / ratio) as u32,
    (display_height as f32 / ratio) as u32
  )
}

/// Breakpoints on `upscale width / render width`.
pub fn preset_for_ratio(ratio: f32) -> PerfQuality {
  if ratio <= 3.0 && ratio > 2.0 {
    PerfQuality::UltraPerformance
  } else if ratio <= 2.0 && ratio > 1.7 {
    PerfQuality::MaxPerf
  } else if ratio <= 1.7 && ratio > 1.5 {
    PerfQuality::Balanced
  } else if ratio <= 1.5 && ratio > 1.3 {
    PerfQuality::MaxQuality
  } else if ratio <= 1.3 && ratio > 1.0 {
    PerfQuality::UltraQuality
  } else {
    PerfQuality::Dlaa
  }
}

pub fn halton(index: i32, base: i32) -> f32 {
  let mut f = 1.0f32;
  let mut result = 0.0f32;
  let mut current = index;
  while current > 0 {
    f /= base as f32;
    result += f * (current % base) as f32;
    current /= base;
  }
  result
}

/// Halton(2, 3) sample of `index` within a sequence of `phase_count`, centred on zero.
pub fn jitter_offset(index: i32, phase_count: i32) -> Option<(f32, f32)> {
  if phase_count <= 0 {
    return None;
  }

  let sample = index.rem_euclid(phase_count) + 1;
  Some((halton(sample, 2) - 0.5, halton(sample, 3) - 0.5))
}

/// `ceil(base * (display / render)^2)`.
pub fn jitter_phase_count(render_width: u32, display_width: u32, base: Option<f32>) -> Option<i32> {
  if render_width == 0 {
    return None;
  }

  let ratio = display_width as f32 / render_width as f32;
  Some((ratio * ratio * base.unwrap_or(DEFAULT_JITTER_PHASE_BASE)).ceil() as i32)
}
