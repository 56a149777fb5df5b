//! Startup validation of loaded settings.

use crate::errors::{Result, SettingsError};
use crate::types::ContinuitySettings;

fn invalid(msg: String) -> SettingsError {
    SettingsError::InvalidValue(msg)
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be in [0, 1], got {value}")))
    }
}

fn positive<T: PartialOrd + Default + std::fmt::Display>(name: &str, value: T) -> Result<()> {
    if value > T::default() {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive, got {value}")))
    }
}

impl ContinuitySettings {
    /// Check every threshold, weight and budget.
    ///
    /// Any failure here is fatal: the engine refuses to start rather than
    /// run with a nonsensical configuration.
    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        positive(
            "session.sessionBoundaryTimeThresholdSeconds",
            session.session_boundary_time_threshold_seconds,
        )?;
        unit_interval(
            "session.fileContinuityThreshold",
            session.file_continuity_threshold,
        )?;
        positive(
            "session.continuityRecencyWindowSeconds",
            session.continuity_recency_window_seconds,
        )?;

        let scoring = &self.scoring;
        for (name, weight) in scoring.weights.named() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!(
                    "scoring.weights.{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        positive("scoring.weights (sum)", scoring.weights.total())?;
        if !scoring.recency_half_life_days.is_finite() {
            return Err(invalid("scoring.recencyHalfLifeDays must be finite".into()));
        }
        positive("scoring.recencyHalfLifeDays", scoring.recency_half_life_days)?;

        let summary = &self.summary;
        if summary.immediate_window_seconds >= summary.recent_window_seconds {
            return Err(invalid(format!(
                "summary.immediateWindowSeconds ({}) must be below summary.recentWindowSeconds ({})",
                summary.immediate_window_seconds, summary.recent_window_seconds
            )));
        }
        if !(summary.compression_ratio > 0.0 && summary.compression_ratio <= 1.0) {
            return Err(invalid(format!(
                "summary.compressionRatio must be in (0, 1], got {}",
                summary.compression_ratio
            )));
        }
        unit_interval(
            "summary.duplicateSimilarityThreshold",
            summary.duplicate_similarity_threshold,
        )?;
        unit_interval(
            "summary.conflictSimilarityThreshold",
            summary.conflict_similarity_threshold,
        )?;
        positive("summary.queueCapacity", summary.queue_capacity)?;
        positive("summary.maxAttempts", summary.max_attempts)?;

        let injection = &self.injection;
        unit_interval("injection.minThreshold", injection.min_threshold)?;
        unit_interval("injection.maxThreshold", injection.max_threshold)?;
        if injection.min_threshold > injection.max_threshold {
            return Err(invalid(format!(
                "injection.minThreshold ({}) exceeds injection.maxThreshold ({})",
                injection.min_threshold, injection.max_threshold
            )));
        }
        if !(injection.min_threshold..=injection.max_threshold)
            .contains(&injection.base_injection_confidence)
        {
            return Err(invalid(format!(
                "injection.baseInjectionConfidence ({}) must lie within [{}, {}]",
                injection.base_injection_confidence,
                injection.min_threshold,
                injection.max_threshold
            )));
        }
        unit_interval("injection.adaptationRate", injection.adaptation_rate)?;
        positive("injection.referenceSessionMinutes", injection.reference_session_minutes)?;
        positive("injection.maxInjectionTokens", injection.max_injection_tokens)?;
        positive(
            "injection.constrainedMaxInjectionTokens",
            injection.constrained_max_injection_tokens,
        )?;
        unit_interval("injection.fileOverlapThreshold", injection.file_overlap_threshold)?;
        if injection.min_gap_seconds > injection.max_gap_seconds {
            return Err(invalid(format!(
                "injection.minGapSeconds ({}) exceeds injection.maxGapSeconds ({})",
                injection.min_gap_seconds, injection.max_gap_seconds
            )));
        }
        unit_interval("injection.minCandidateScore", injection.min_candidate_score)?;
        unit_interval("injection.richnessTopScore", injection.richness_top_score)?;
        positive("injection.latencyBudgetMs", injection.latency_budget_ms)?;
        positive("injection.collaboratorTimeoutMs", injection.collaborator_timeout_ms)?;

        positive("storage.poolSize", self.storage.pool_size)?;
        positive("storage.candidateLimit", self.storage.candidate_limit)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_pass() {
        assert!(ContinuitySettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_negative_weight() {
        let mut s = ContinuitySettings::default();
        s.scoring.weights.recency = -0.1;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("scoring.weights.recency"));
    }

    #[test]
    fn rejects_all_zero_weights() {
        let mut s = ContinuitySettings::default();
        s.scoring.weights.semantic = 0.0;
        s.scoring.weights.file_overlap = 0.0;
        s.scoring.weights.recency = 0.0;
        s.scoring.weights.type_weight = 0.0;
        s.scoring.weights.tag_overlap = 0.0;
        assert_matches!(s.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn rejects_zero_compression_ratio() {
        let mut s = ContinuitySettings::default();
        s.summary.compression_ratio = 0.0;
        assert_matches!(s.validate(), Err(SettingsError::InvalidValue(m)) if m.contains("compressionRatio"));
    }

    #[test]
    fn rejects_inverted_threshold_bounds() {
        let mut s = ContinuitySettings::default();
        s.injection.min_threshold = 0.8;
        s.injection.max_threshold = 0.2;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_base_confidence_outside_bounds() {
        let mut s = ContinuitySettings::default();
        s.injection.base_injection_confidence = 0.9;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_overlapping_tier_windows() {
        let mut s = ContinuitySettings::default();
        s.summary.immediate_window_seconds = 90_000;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_zero_budget() {
        let mut s = ContinuitySettings::default();
        s.injection.max_injection_tokens = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn unequal_weight_sum_is_allowed() {
        let mut s = ContinuitySettings::default();
        s.scoring.weights.semantic = 2.0;
        assert!(s.validate().is_ok());
    }
}
