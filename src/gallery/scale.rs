use serde::Serialize;

pub const DEFAULT_THUMBNAIL_LIMIT: f64 = 250.0;
pub const DEFAULT_DIVISOR_STEP: f64 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Each record is scaled by the divisor of its own longest side.
    #[default]
    PerRecord,
    /// One divisor, taken from the longest side across all records.
    Shared,
}

impl ScaleMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "per-record" | "per_record" | "record" => Some(Self::PerRecord),
            "shared" | "global" => Some(Self::Shared),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PerRecord => "per-record",
            Self::Shared => "shared",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScaleOptions {
    pub mode: ScaleMode,
    pub limit: f64,
    pub step: f64,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            mode: ScaleMode::PerRecord,
            limit: DEFAULT_THUMBNAIL_LIMIT,
            step: DEFAULT_DIVISOR_STEP,
        }
    }
}

impl ScaleOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !self.limit.is_finite() || self.limit <= 0.0 {
            return Err(format!(
                "invalid thumbnail limit {}, expected a positive number",
                self.limit
            ));
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(format!(
                "invalid divisor step {}, expected a positive number",
                self.step
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ThumbSize {
    pub width: f64,
    pub height: f64,
}

impl ThumbSize {
    pub fn scaled(width: f64, height: f64, divisor: f64) -> Self {
        Self {
            width: width / divisor,
            height: height / divisor,
        }
    }
}

/// Step counts above this no longer map to distinct divisors.
const MAX_EXACT_STEPS: f64 = 9_007_199_254_740_992.0;

/// Float rounding of the estimate is off by a few steps at most.
const MAX_CORRECTIONS: usize = 64;

/// Smallest divisor in `1, 1+step, 1+2*step, ...` that brings `max_length`
/// down to `limit` or below.
pub fn divisor(max_length: f64, limit: f64, step: f64) -> f64 {
    if !max_length.is_finite() || max_length <= limit || limit <= 0.0 || step <= 0.0 {
        return 1.0;
    }
    let estimate = ((max_length / limit - 1.0) / step).ceil().max(0.0);
    if !estimate.is_finite() {
        return max_length / limit;
    }
    if estimate >= MAX_EXACT_STEPS {
        return 1.0 + estimate * step;
    }

    let at = |k: u64| 1.0 + k as f64 * step;
    let mut k = estimate as u64;
    for _ in 0..MAX_CORRECTIONS {
        if max_length / at(k) <= limit {
            break;
        }
        k += 1;
    }
    for _ in 0..MAX_CORRECTIONS {
        if k == 0 || max_length / at(k - 1) > limit {
            break;
        }
        k -= 1;
    }
    at(k)
}

pub fn longest_side(width: f64, height: f64) -> f64 {
    width.max(height)
}

pub fn shared_divisor<I>(sides: I, options: &ScaleOptions) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let longest = sides
        .into_iter()
        .map(|(w, h)| longest_side(w, h))
        .fold(0.0_f64, f64::max);
    divisor(longest, options.limit, options.step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_images_keep_divisor_one() {
        assert_eq!(divisor(0.0, 250.0, 0.5), 1.0);
        assert_eq!(divisor(120.0, 250.0, 0.5), 1.0);
        assert_eq!(divisor(250.0, 250.0, 0.5), 1.0);
    }

    #[test]
    fn divisor_walks_half_steps() {
        assert_eq!(divisor(251.0, 250.0, 0.5), 1.5);
        assert_eq!(divisor(375.0, 250.0, 0.5), 1.5);
        assert_eq!(divisor(376.0, 250.0, 0.5), 2.0);
        assert_eq!(divisor(800.0, 250.0, 0.5), 3.5);
        assert_eq!(divisor(1000.0, 250.0, 0.5), 4.0);
    }

    #[test]
    fn step_below_float_precision_terminates() {
        let d = divisor(500.0, 250.0, 1e-17);
        assert!(d.is_finite());
        assert!(500.0 / d <= 250.0 * (1.0 + 1e-9));
        assert!(d >= 1.9 && d <= 2.1);
    }

    #[test]
    fn huge_finite_side_terminates() {
        let d = divisor(1e300, 250.0, 0.5);
        assert!(d.is_finite());
        assert!(1e300 / d <= 250.0 * (1.0 + 1e-9));
    }

    #[test]
    fn tiny_step_near_limit_lands_on_first_fitting_divisor() {
        let d = divisor(250.000_001, 250.0, 1e-12);
        assert!(250.000_001 / d <= 250.0);
        assert!(250.000_001 / (d - 1e-12) > 250.0 * (1.0 - 1e-12));
    }

    #[test]
    fn shared_divisor_uses_largest_side_overall() {
        let opts = ScaleOptions::default();
        let d = shared_divisor([(100.0, 50.0), (600.0, 900.0), (300.0, 10.0)], &opts);
        assert_eq!(d, 4.0);
    }

    #[test]
    fn scale_mode_parses_aliases() {
        assert_eq!(ScaleMode::parse("Shared"), Some(ScaleMode::Shared));
        assert_eq!(ScaleMode::parse("per_record"), Some(ScaleMode::PerRecord));
        assert_eq!(ScaleMode::parse("nope"), None);
    }

    #[test]
    fn options_reject_non_positive_values() {
        let bad_limit = ScaleOptions {
            limit: 0.0,
            ..ScaleOptions::default()
        };
        assert!(bad_limit.validate().is_err());
        let bad_step = ScaleOptions {
            step: -0.5,
            ..ScaleOptions::default()
        };
        assert!(bad_step.validate().is_err());
        assert!(ScaleOptions::default().validate().is_ok());
    }
}
