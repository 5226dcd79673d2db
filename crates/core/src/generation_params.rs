//! Canonical generation parameters.
//!
//! The UI-facing view of how an image was generated. Every field is
//! optional: `None` is the "not available" sentinel and serializes as
//! `null`, which keeps it distinct from a present-but-empty string.

use serde::Serialize;
use serde_json::Value;
use ts_rs::TS;

/// Rendered in place of a missing field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Rendered as the upscale factor when the workflow has no upscale stage.
pub const UPSCALE_DISABLED: &str = "Disabled";

/// Marker some writers use for a prompt they could not find.
pub const NOT_FOUND_MARKER: &str = "(Not found)";

/// Suffix stripped from LoRA file names.
const LORA_FILE_SUFFIX: &str = ".safetensors";

/// Name used for a LoRA loader without a readable `lora_name`.
pub const UNKNOWN_LORA: &str = "Unknown Lora";

/// Weight used when a LoRA carries no numeric strength.
pub const DEFAULT_LORA_WEIGHT: f64 = 1.0;

/// 2^53: above this not every integer is representable as `f64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A LoRA applied during generation.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct LoraEntry {
    pub name: String,
    pub weight: f64,
}

impl LoraEntry {
    /// Build an entry from a raw file name and an optional strength.
    pub fn new(file_name: Option<&str>, weight: Option<f64>) -> Self {
        let name = match file_name {
            Some(file_name) => file_name
                .strip_suffix(LORA_FILE_SUFFIX)
                .unwrap_or(file_name)
                .to_string(),
            None => UNKNOWN_LORA.to_string(),
        };
        Self {
            name,
            weight: weight.unwrap_or(DEFAULT_LORA_WEIGHT),
        }
    }
}

/// Whether the generation ran an upscale ("hires fix") stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum HiresFix {
    /// The document does not say (flat metadata without upscale keys).
    #[default]
    Unknown,
    /// The workflow has no upscale stage.
    Disabled,
    /// An upscale stage exists; its fields may still be unreadable.
    Enabled,
}

/// Generation settings inferred from a workflow or flat metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CanonicalParameters {
    pub model: Option<String>,
    pub seed: Option<String>,
    pub steps: Option<String>,
    pub cfg: Option<String>,
    pub sampler: Option<String>,
    pub scheduler: Option<String>,
    pub denoise: Option<String>,
    /// Upscale factor.
    pub hires_upscale: Option<String>,
    /// Upscale method or model name.
    pub hires_upscaler: Option<String>,
    pub hires_fix: HiresFix,
    pub positive_prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub loras: Vec<LoraEntry>,
}

impl CanonicalParameters {
    /// The all-sentinel parameter set.
    pub fn not_available() -> Self {
        Self::default()
    }

    /// Whether no field could be resolved.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Upscale factor as shown in a details panel.
    pub fn hires_upscale_display(&self) -> &str {
        match (self.hires_fix, self.hires_upscale.as_deref()) {
            (_, Some(scale)) => scale,
            (HiresFix::Disabled, None) => UPSCALE_DISABLED,
            _ => NOT_AVAILABLE,
        }
    }

    /// Comma-separated tags of the positive prompt.
    pub fn prompt_tags(&self) -> Vec<String> {
        self.positive_prompt
            .as_deref()
            .map(prompt_tags)
            .unwrap_or_default()
    }

    /// Apply the prompt normalization rules in place.
    pub(crate) fn normalize_prompts(&mut self) {
        for prompt in [&mut self.positive_prompt, &mut self.negative_prompt] {
            if prompt.as_deref() == Some(NOT_FOUND_MARKER) {
                *prompt = None;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Render an optional field, substituting [`NOT_AVAILABLE`].
pub fn display_or_na(field: Option<&str>) -> &str {
    field.unwrap_or(NOT_AVAILABLE)
}

/// Format a number with at most two fractional digits.
///
/// Integral values render without a decimal point: `1.0` → `"1"`,
/// `7.5` → `"7.5"`, `0.333` → `"0.33"`.
pub fn format_decimal(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    // Scaling an integral value could overflow to infinity.
    let rounded = if value.fract() == 0.0 {
        value
    } else {
        (value * 100.0).round() / 100.0
    };

    if rounded.fract() != 0.0 {
        format!("{rounded}")
    } else if rounded.abs() < MAX_EXACT_INTEGER {
        // `as i64` also folds -0.0 into 0.
        format!("{}", rounded as i64)
    } else {
        format!("{rounded:.0}")
    }
}

/// Render a displayable scalar verbatim (strings as-is, numbers and
/// booleans via their JSON text).
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Render a displayable scalar, formatting numbers with [`format_decimal`].
pub fn decimal_scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_f64().map(format_decimal),
        other => scalar_to_string(other),
    }
}

/// Split a prompt into unique, trimmed, comma-separated tags.
pub fn prompt_tags(prompt: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in prompt.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
