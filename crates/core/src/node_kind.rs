//! Node classification for workflow documents.
//!
//! Every node is classified exactly once, when the document is parsed, by
//! matching its `class_type` against an ordered list of substring rules.
//! Downstream code (inference, display) matches on [`NodeKind`] instead of
//! re-testing class names.

// ---------------------------------------------------------------------------
// Class-type patterns
// ---------------------------------------------------------------------------

/// LoRA loaders (`LoraLoader`, `LoraLoaderModelOnly`, ...).
const LORA_LOADER_PATTERN: &str = "LoraLoader";

/// Upscale model loaders.
const UPSCALE_MODEL_LOADER_PATTERN: &str = "UpscaleModelLoader";

/// Any other loader (checkpoints, VAEs, CLIP, ...).
const LOADER_PATTERN: &str = "Loader";

/// Upscale stages.
const UPSCALE_PATTERNS: &[&str] = &["ImageUpscaleWithModel", "LatentUpscale"];

/// KSampler-named samplers, preferred over generic samplers.
const KSAMPLER_PATTERN: &str = "KSampler";

/// Generic samplers.
const SAMPLER_PATTERN: &str = "Sampler";

/// Sampler nodes whose name does not contain "Sampler".
const SAMPLER_EXACT: &[&str] = &["BNK_Unsampler"];

/// CLIP text encoders, including the SDXL dual encoder.
const TEXT_ENCODE_PATTERN: &str = "CLIPTextEncode";

/// Plain text primitive feeding SDXL dual encoders.
pub const TEXT_PRIMITIVE_CLASS: &str = "ttN text";

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Which family a sampler node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFamily {
    /// `class_type` contains "KSampler".
    KSampler,
    /// Any other sampler.
    Generic,
}

/// Role of a workflow node, derived from its `class_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Loader,
    LoraLoader,
    UpscaleModelLoader,
    Upscaler,
    Sampler(SamplerFamily),
    TextEncode,
    TextPrimitive,
    Other,
}

impl NodeKind {
    /// Classify a `class_type`. The first matching rule wins.
    pub fn classify(class_type: &str) -> Self {
        if class_type.contains(LORA_LOADER_PATTERN) {
            NodeKind::LoraLoader
        } else if class_type.contains(UPSCALE_MODEL_LOADER_PATTERN) {
            NodeKind::UpscaleModelLoader
        } else if class_type.contains(LOADER_PATTERN) {
            NodeKind::Loader
        } else if UPSCALE_PATTERNS.iter().any(|p| class_type.contains(p)) {
            NodeKind::Upscaler
        } else if class_type.contains(KSAMPLER_PATTERN) {
            NodeKind::Sampler(SamplerFamily::KSampler)
        } else if class_type.contains(SAMPLER_PATTERN) || SAMPLER_EXACT.contains(&class_type) {
            NodeKind::Sampler(SamplerFamily::Generic)
        } else if class_type.contains(TEXT_ENCODE_PATTERN) {
            NodeKind::TextEncode
        } else if class_type == TEXT_PRIMITIVE_CLASS {
            NodeKind::TextPrimitive
        } else {
            NodeKind::Other
        }
    }

    /// Stable lowercase label used by the UI to style nodes.
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Loader => "loader",
            NodeKind::LoraLoader => "lora_loader",
            NodeKind::UpscaleModelLoader => "upscale_model_loader",
            NodeKind::Upscaler => "upscaler",
            NodeKind::Sampler(_) => "sampler",
            NodeKind::TextEncode => "text_encode",
            NodeKind::TextPrimitive => "text_primitive",
            NodeKind::Other => "other",
        }
    }

    /// Whether the class name contains "Loader" (all loader kinds).
    pub fn is_loader(self) -> bool {
        matches!(
            self,
            NodeKind::Loader | NodeKind::LoraLoader | NodeKind::UpscaleModelLoader
        )
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, NodeKind::Sampler(_))
    }

    /// Nodes that carry prompt text.
    pub fn is_text(self) -> bool {
        matches!(self, NodeKind::TextEncode | NodeKind::TextPrimitive)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
