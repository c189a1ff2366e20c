use std::fmt;
use serde::{Serialize, Deserialize};
use crate::analysis::FlowFeatures;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLabel {
    VideoStreaming,
    VideoCall,
    AudioStreaming,
    Browsing,
    Unknown,
}

impl fmt::Display for TrafficLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrafficLabel::VideoStreaming => "Video Streaming",
            TrafficLabel::VideoCall => "Video Calls",
            TrafficLabel::AudioStreaming => "Audio Streaming",
            TrafficLabel::Browsing => "Internet Browsing",
            TrafficLabel::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// Open interval `(min, max)`. A missing `max` extends to infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub min: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Bound {
    pub const fn between(min: f64, max: f64) -> Self {
        Self { min, max: Some(max) }
    }

    pub const fn above(min: f64) -> Self {
        Self { min, max: None }
    }

    pub fn contains(&self, value: f64) -> bool {
        value > self.min && self.max.map_or(true, |max| value < max)
    }

    fn check(&self) -> Result<(), String> {
        if self.min.is_nan() {
            return Err("lower limit is NaN".to_string());
        }
        match self.max {
            Some(max) if max.is_nan() => Err("upper limit is NaN".to_string()),
            Some(max) if max <= self.min => {
                Err(format!("empty interval ({}, {})", self.min, max))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub label: TrafficLabel,
    pub packet_size: Bound,
    pub inter_arrival_std_ms: Bound,
    pub bitrate_mbps: Bound,
}

impl ThresholdRule {
    pub fn new(
        label: TrafficLabel,
        packet_size: Bound,
        inter_arrival_std_ms: Bound,
        bitrate_mbps: Bound,
    ) -> Self {
        Self {
            label,
            packet_size,
            inter_arrival_std_ms,
            bitrate_mbps,
        }
    }

    /// Every dimension must fall inside its bound.
    pub fn matches(&self, features: &FlowFeatures) -> bool {
        self.packet_size.contains(features.avg_packet_size)
            && self.inter_arrival_std_ms.contains(features.std_inter_arrival)
            && self.bitrate_mbps.contains(features.bitrate_mbps)
    }
}

/// Ordered decision list; the first matching rule decides the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<ThresholdRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<ThresholdRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    pub fn classify(&self, features: &FlowFeatures) -> TrafficLabel {
        for rule in &self.rules {
            if rule.matches(features) {
                return rule.label;
            }
        }
        TrafficLabel::Unknown
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, rule) in self.rules.iter().enumerate() {
            let checks = [
                ("packet_size", rule.packet_size.check()),
                ("inter_arrival_std_ms", rule.inter_arrival_std_ms.check()),
                ("bitrate_mbps", rule.bitrate_mbps.check()),
            ];
            for (field, check) in checks {
                if let Err(reason) = check {
                    return Err(ConfigError::InvalidRule {
                        index,
                        label: rule.label.to_string(),
                        reason: format!("{}: {}", field, reason),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new(vec![
            ThresholdRule::new(
                TrafficLabel::VideoStreaming,
                Bound::between(950.0, 1460.0),
                Bound::between(10.0, 25.0),
                Bound::between(2.0, 8.0),
            ),
            ThresholdRule::new(
                TrafficLabel::VideoCall,
                Bound::between(500.0, 1200.0),
                Bound::between(5.0, 25.0),
                Bound::between(0.5, 3.0),
            ),
            ThresholdRule::new(
                TrafficLabel::AudioStreaming,
                Bound::between(150.0, 450.0),
                Bound::between(3.0, 8.0),
                Bound::between(0.1, 0.3),
            ),
            ThresholdRule::new(
                TrafficLabel::Browsing,
                Bound::between(600.0, 1400.0),
                Bound::above(50.0),
                Bound::between(0.1, 5.0),
            ),
        ])
    }
}
