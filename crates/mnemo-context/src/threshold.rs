//! Injection confidence thresholds.
//!
//! The engine asks a [`ThresholdStrategy`] for the confidence a turn must
//! reach before context is injected, and reports the length of every closed
//! session back to it. [`FixedThreshold`] ignores those reports;
//! [`SessionLengthThreshold`] follows them.

use mnemo_settings::InjectionSettings;

/// Largest shift the session-length strategy applies to the base threshold.
const MAX_SHIFT: f64 = 0.2;

/// Supplies the confidence threshold for injection.
pub trait ThresholdStrategy: Send + Sync {
    /// Current threshold, within the configured bounds.
    fn threshold(&self) -> f64;

    /// Observe the length of a session that just closed.
    fn observe_session(&mut self, _duration_secs: i64) {}

    /// Strategy name for traces.
    fn name(&self) -> &'static str;
}

/// Build the strategy selected by `adaptiveThresholds`.
pub fn strategy_from_settings(settings: &InjectionSettings) -> Box<dyn ThresholdStrategy> {
    if settings.adaptive_thresholds {
        Box::new(SessionLengthThreshold::new(settings))
    } else {
        Box::new(FixedThreshold::new(settings))
    }
}

/// The base confidence, clamped to the bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedThreshold {
    value: f64,
}

impl FixedThreshold {
    /// Threshold from `baseInjectionConfidence`.
    #[must_use]
    pub fn new(settings: &InjectionSettings) -> Self {
        Self {
            value: settings
                .base_injection_confidence
                .clamp(settings.min_threshold, settings.max_threshold),
        }
    }
}

impl ThresholdStrategy for FixedThreshold {
    fn threshold(&self) -> f64 {
        self.value
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Threshold that follows the observed session length.
///
/// Keeps an exponential moving average of closed-session lengths. Sessions
/// shorter than `referenceSessionMinutes` lower the threshold, so brief and
/// frequent sessions get context more readily; longer ones raise it. The
/// shift is at most ±0.2 and the result stays within
/// `[minThreshold, maxThreshold]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionLengthThreshold {
    base: f64,
    min: f64,
    max: f64,
    rate: f64,
    reference_secs: f64,
    average_secs: Option<f64>,
}

impl SessionLengthThreshold {
    /// Strategy seeded from the injection settings.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(settings: &InjectionSettings) -> Self {
        Self {
            base: settings.base_injection_confidence,
            min: settings.min_threshold,
            max: settings.max_threshold,
            rate: settings.adaptation_rate.clamp(0.0, 1.0),
            reference_secs: (settings.reference_session_minutes.max(1) * 60) as f64,
            average_secs: None,
        }
    }

    /// Average observed session length, once any session has closed.
    pub fn average_secs(&self) -> Option<f64> {
        self.average_secs
    }
}

impl ThresholdStrategy for SessionLengthThreshold {
    fn threshold(&self) -> f64 {
        let shift = self.average_secs.map_or(0.0, |avg| {
            (MAX_SHIFT * (avg / self.reference_secs - 1.0)).clamp(-MAX_SHIFT, MAX_SHIFT)
        });
        (self.base + shift).clamp(self.min, self.max)
    }

    #[allow(clippy::cast_precision_loss)]
    fn observe_session(&mut self, duration_secs: i64) {
        let length = duration_secs.max(0) as f64;
        self.average_secs = Some(match self.average_secs {
            None => length,
            Some(avg) => avg + self.rate * (length - avg),
        });
    }

    fn name(&self) -> &'static str {
        "session_length"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fixed_is_clamped() {
        let s = InjectionSettings {
            base_injection_confidence: 0.9,
            ..InjectionSettings::default()
        };
        assert!(close(FixedThreshold::new(&s).threshold(), 0.7));
        assert!(close(FixedThreshold::new(&InjectionSettings::default()).threshold(), 0.3));
    }

    #[test]
    fn fixed_ignores_observations() {
        let mut t = FixedThreshold::new(&InjectionSettings::default());
        t.observe_session(60);
        assert!(close(t.threshold(), 0.3));
        assert_eq!(t.name(), "fixed");
    }

    #[test]
    fn session_length_starts_at_base() {
        let t = SessionLengthThreshold::new(&InjectionSettings::default());
        assert!(close(t.threshold(), 0.3));
        assert_eq!(t.average_secs(), None);
    }

    #[test]
    fn short_sessions_lower_and_long_sessions_raise() {
        let settings = InjectionSettings::default();

        let mut short = SessionLengthThreshold::new(&settings);
        short.observe_session(45 * 60);
        assert!(close(short.threshold(), 0.2));

        let mut long = SessionLengthThreshold::new(&settings);
        long.observe_session(135 * 60);
        assert!(close(long.threshold(), 0.4));

        let mut huge = SessionLengthThreshold::new(&settings);
        huge.observe_session(20 * 3600);
        assert!(close(huge.threshold(), 0.5));
    }

    #[test]
    fn stays_within_bounds() {
        let settings = InjectionSettings {
            base_injection_confidence: 0.15,
            ..InjectionSettings::default()
        };
        let mut t = SessionLengthThreshold::new(&settings);
        t.observe_session(0);
        assert!(close(t.threshold(), 0.1));
    }

    #[test]
    fn average_moves_by_rate() {
        let mut t = SessionLengthThreshold::new(&InjectionSettings::default());
        t.observe_session(1000);
        t.observe_session(2000);
        assert!(close(t.average_secs().unwrap(), 1100.0));
        t.observe_session(-50);
        assert!(close(t.average_secs().unwrap(), 990.0));
    }

    #[test]
    fn settings_pick_strategy() {
        let adaptive = InjectionSettings {
            adaptive_thresholds: true,
            ..InjectionSettings::default()
        };
        assert_eq!(strategy_from_settings(&adaptive).name(), "session_length");
        assert_eq!(strategy_from_settings(&InjectionSettings::default()).name(), "fixed");
    }
}
