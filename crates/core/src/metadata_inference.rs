//! Generation parameter inference.
//!
//! Two modes, picked automatically:
//!
//! - **Node graph**: the document contains workflow nodes. The primary
//!   sampler supplies the sampling settings, its `positive`/`negative` links
//!   lead to the prompts, and loaders and upscalers are found by kind.
//! - **Flat**: anything else. Fields are read by key, accepting the
//!   snake_case and camelCase spellings writers have used.
//!
//! Inference never fails from the caller's point of view: an unusable
//! document yields [`CanonicalParameters::not_available`].

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::generation_params::{
    decimal_scalar_to_string, format_decimal, scalar_to_string, CanonicalParameters, HiresFix,
    LoraEntry, UPSCALE_DISABLED,
};
use crate::node_kind::{NodeKind, SamplerFamily};
use crate::workflow_document::{is_node_graph, InputValue, WorkflowDocument, WorkflowNode};

// ---------------------------------------------------------------------------
// Node input names
// ---------------------------------------------------------------------------

const SEED_INPUTS: &[&str] = &["seed", "noise_seed"];
const STEPS_INPUTS: &[&str] = &["steps"];
const CFG_INPUTS: &[&str] = &["cfg"];
const SAMPLER_NAME_INPUTS: &[&str] = &["sampler_name"];
const SCHEDULER_INPUTS: &[&str] = &["scheduler"];
const DENOISE_INPUTS: &[&str] = &["denoise"];

/// Text inputs of a text encoder, in resolution order.
const TEXT_INPUTS: &[&str] = &["text", "text_g", "text_l"];

const CHECKPOINT_INPUTS: &[&str] = &["ckpt_name"];
const LORA_NAME_INPUTS: &[&str] = &["lora_name"];
const LORA_WEIGHT_INPUTS: &[&str] = &["strength_model"];
const UPSCALE_MODEL_INPUTS: &[&str] = &["model_name"];
const UPSCALER_NAME_INPUTS: &[&str] = &["upscaler_name", "upscale_model", "upscale_method", "upscaler"];
const SCALE_INPUTS: &[&str] = &["scale", "scale_by", "upscale_factor", "multiplier"];

/// `add_noise` value meaning the sampler starts from pure noise.
const ADD_NOISE_ENABLED: &str = "enable";

/// Title fragments marking a prompt node as negative / positive.
const NEGATIVE_TITLE_HINTS: &[&str] = &["negative"];
const POSITIVE_TITLE_HINTS: &[&str] = &["positive", "prompt", "encode"];

// ---------------------------------------------------------------------------
// Flat metadata keys
// ---------------------------------------------------------------------------

const FLAT_MODEL_KEYS: &[&str] = &["model", "model_name", "modelName"];
const FLAT_SEED_KEYS: &[&str] = &["seed"];
const FLAT_STEPS_KEYS: &[&str] = &["steps"];
const FLAT_CFG_KEYS: &[&str] = &["cfg", "cfg_scale", "cfgScale"];
const FLAT_SAMPLER_KEYS: &[&str] = &["sampler", "sampler_name", "samplerName"];
const FLAT_SCHEDULER_KEYS: &[&str] = &["scheduler"];
const FLAT_DENOISE_KEYS: &[&str] = &["denoise"];
const FLAT_UPSCALE_KEYS: &[&str] = &["hiresUpscale", "hires_upscale", "hires_fix", "hiresFix"];
const FLAT_UPSCALER_KEYS: &[&str] = &["hiresUpscaler", "hires_upscaler"];
const FLAT_POSITIVE_KEYS: &[&str] = &["positivePrompt", "positive_prompt", "prompt"];
const FLAT_NEGATIVE_KEYS: &[&str] = &["negativePrompt", "negative_prompt"];
const FLAT_LORA_KEYS: &[&str] = &["loras", "lora_models", "loraModels"];

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Infer generation parameters from a metadata document.
///
/// `None`, and any document that cannot be read, yields the all-sentinel
/// parameter set.
pub fn infer_parameters(document: Option<&Value>) -> CanonicalParameters {
    let Some(document) = document else {
        return CanonicalParameters::not_available();
    };

    match try_infer_parameters(document) {
        Ok(params) => params,
        Err(e) => {
            tracing::warn!(error = %e, "Parameter inference failed, using empty parameters");
            CanonicalParameters::not_available()
        }
    }
}

/// Fallible form of [`infer_parameters`].
pub fn try_infer_parameters(document: &Value) -> Result<CanonicalParameters, CoreError> {
    if is_node_graph(document) {
        let workflow = WorkflowDocument::from_value(document)?;
        tracing::debug!(nodes = workflow.len(), "Inferring parameters from node graph");
        Ok(infer_from_workflow(&workflow))
    } else {
        let obj = document.as_object().ok_or_else(|| {
            CoreError::Validation("Metadata document must be a JSON object".to_string())
        })?;
        tracing::debug!(keys = obj.len(), "Inferring parameters from flat metadata");
        Ok(infer_from_flat(obj))
    }
}

/// Infer parameters from an already parsed workflow.
pub fn infer_from_workflow(workflow: &WorkflowDocument) -> CanonicalParameters {
    let mut params = CanonicalParameters::not_available();

    match primary_sampler(workflow) {
        Some(sampler) => {
            apply_sampler_settings(&mut params, sampler);
            params.positive_prompt = resolve_prompt(workflow, sampler, "positive");
            params.negative_prompt = resolve_prompt(workflow, sampler, "negative");
        }
        None => assign_prompts_by_title(&mut params, workflow),
    }

    params.model = workflow
        .find(|node| {
            node.kind.is_loader()
                && node
                    .first_str(CHECKPOINT_INPUTS)
                    .is_some_and(|name| !name.is_empty())
        })
        .and_then(|node| node.first_str(CHECKPOINT_INPUTS))
        .map(str::to_string);

    params.loras = workflow
        .nodes()
        .iter()
        .filter(|node| node.kind == NodeKind::LoraLoader)
        .map(|node| {
            LoraEntry::new(
                node.first_str(LORA_NAME_INPUTS),
                node.first_f64(LORA_WEIGHT_INPUTS),
            )
        })
        .collect();

    apply_upscale_settings(&mut params, workflow);
    params.normalize_prompts();
    params
}

/// Read parameters from a flat key/value metadata object.
pub fn infer_from_flat(obj: &Map<String, Value>) -> CanonicalParameters {
    let text = |keys: &[&str]| flat_value(obj, keys).and_then(scalar_to_string);
    let decimal = |keys: &[&str]| flat_value(obj, keys).and_then(decimal_scalar_to_string);

    let mut params = CanonicalParameters {
        model: text(FLAT_MODEL_KEYS),
        seed: text(FLAT_SEED_KEYS),
        steps: text(FLAT_STEPS_KEYS),
        cfg: decimal(FLAT_CFG_KEYS),
        sampler: text(FLAT_SAMPLER_KEYS),
        scheduler: text(FLAT_SCHEDULER_KEYS),
        denoise: decimal(FLAT_DENOISE_KEYS),
        hires_upscaler: text(FLAT_UPSCALER_KEYS),
        positive_prompt: text(FLAT_POSITIVE_KEYS),
        negative_prompt: text(FLAT_NEGATIVE_KEYS),
        loras: flat_loras(obj),
        ..CanonicalParameters::not_available()
    };

    match flat_value(obj, FLAT_UPSCALE_KEYS) {
        Some(Value::String(s)) if s == UPSCALE_DISABLED => params.hires_fix = HiresFix::Disabled,
        Some(Value::Bool(false)) => params.hires_fix = HiresFix::Disabled,
        Some(value) => {
            params.hires_fix = HiresFix::Enabled;
            params.hires_upscale = decimal_scalar_to_string(value);
        }
        None if params.hires_upscaler.is_some() => params.hires_fix = HiresFix::Enabled,
        None => {}
    }

    params.normalize_prompts();
    params
}

// ---------------------------------------------------------------------------
// Node graph helpers
// ---------------------------------------------------------------------------

/// KSampler-named samplers win over generic ones; ties go to document order.
fn primary_sampler(workflow: &WorkflowDocument) -> Option<&WorkflowNode> {
    workflow
        .find(|node| node.kind == NodeKind::Sampler(SamplerFamily::KSampler))
        .or_else(|| workflow.find(|node| node.kind.is_sampler()))
}

fn first_display(node: &WorkflowNode, names: &[&str]) -> Option<Value> {
    names
        .iter()
        .find_map(|name| node.input(name).and_then(InputValue::as_display_scalar))
        .cloned()
}

fn apply_sampler_settings(params: &mut CanonicalParameters, sampler: &WorkflowNode) {
    let text = |names: &[&str]| first_display(sampler, names).as_ref().and_then(scalar_to_string);
    let decimal =
        |names: &[&str]| first_display(sampler, names).as_ref().and_then(decimal_scalar_to_string);

    params.seed = text(SEED_INPUTS);
    params.steps = text(STEPS_INPUTS);
    params.cfg = decimal(CFG_INPUTS);
    params.sampler = text(SAMPLER_NAME_INPUTS);
    params.scheduler = text(SCHEDULER_INPUTS);
    params.denoise = decimal(DENOISE_INPUTS).or_else(|| denoise_fallback(sampler).map(format_decimal));
}

/// Denoise strength for samplers without a `denoise` input
/// (e.g. `KSamplerAdvanced`).
fn denoise_fallback(sampler: &WorkflowNode) -> Option<f64> {
    if sampler.first_str(&["add_noise"]) == Some(ADD_NOISE_ENABLED) {
        return Some(1.0);
    }
    let start = sampler.first_f64(&["start_at_step"])?;
    if start == 0.0 {
        return Some(1.0);
    }
    let steps = sampler.first_f64(STEPS_INPUTS)?;
    if steps <= 0.0 {
        return None;
    }
    Some((1.0 - start / steps).max(0.0))
}

/// Follow a sampler conditioning input to its prompt text.
fn resolve_prompt(workflow: &WorkflowDocument, sampler: &WorkflowNode, slot: &str) -> Option<String> {
    let link = sampler.input(slot)?.as_link()?;
    let encoder = workflow.resolve(link)?;
    if encoder.kind != NodeKind::TextEncode {
        return None;
    }
    encoder_text(workflow, encoder)
}

/// Text of an encoder: `text`, else the SDXL `text_g` / `text_l` pair.
fn encoder_text(workflow: &WorkflowDocument, encoder: &WorkflowNode) -> Option<String> {
    TEXT_INPUTS
        .iter()
        .find_map(|name| encoder.input(name).and_then(|value| text_value(workflow, value)))
}

/// A literal string, or a link to a `ttN text` primitive.
fn text_value(workflow: &WorkflowDocument, value: &InputValue) -> Option<String> {
    match value {
        InputValue::Scalar(Value::String(text)) => Some(text.clone()),
        InputValue::Link(link) => {
            let source = workflow.resolve(link)?;
            if source.kind != NodeKind::TextPrimitive {
                return None;
            }
            source.first_str(&["text"]).map(str::to_string)
        }
        InputValue::Scalar(_) => None,
    }
}

/// Prompt assignment for graphs without a sampler, based on node titles.
fn assign_prompts_by_title(params: &mut CanonicalParameters, workflow: &WorkflowDocument) {
    let prompts: Vec<(String, String)> = workflow
        .nodes()
        .iter()
        .filter(|node| node.kind.is_text())
        .filter_map(|node| {
            let text = match node.kind {
                NodeKind::TextPrimitive => node.first_str(&["text"]).map(str::to_string),
                _ => encoder_text(workflow, node),
            }?;
            let title = node.title.as_deref().unwrap_or_default().to_lowercase();
            (!text.is_empty()).then_some((title, text))
        })
        .collect();

    for (title, text) in &prompts {
        let has_hint = |hints: &[&str]| hints.iter().any(|hint| title.contains(hint));
        if has_hint(NEGATIVE_TITLE_HINTS) {
            if params.negative_prompt.is_none() {
                params.negative_prompt = Some(text.clone());
            }
        } else if has_hint(POSITIVE_TITLE_HINTS) && params.positive_prompt.is_none() {
            params.positive_prompt = Some(text.clone());
        }
    }

    if params.positive_prompt.is_none() {
        params.positive_prompt = prompts.first().map(|(_, text)| text.clone());
    }
    if params.negative_prompt.is_none() {
        params.negative_prompt = prompts.get(1).map(|(_, text)| text.clone());
    }
}

fn apply_upscale_settings(params: &mut CanonicalParameters, workflow: &WorkflowDocument) {
    let Some(upscaler) = workflow.find(|node| node.kind == NodeKind::Upscaler) else {
        params.hires_fix = HiresFix::Disabled;
        return;
    };

    params.hires_fix = HiresFix::Enabled;
    params.hires_upscaler = workflow
        .find(|node| node.kind == NodeKind::UpscaleModelLoader)
        .and_then(|loader| loader.first_str(UPSCALE_MODEL_INPUTS))
        .or_else(|| upscaler.first_str(UPSCALER_NAME_INPUTS))
        .map(str::to_string);
    params.hires_upscale = first_display(upscaler, SCALE_INPUTS)
        .as_ref()
        .and_then(decimal_scalar_to_string);
}

// ---------------------------------------------------------------------------
// Flat metadata helpers
// ---------------------------------------------------------------------------

/// First non-null value among `keys`.
fn flat_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn flat_loras(obj: &Map<String, Value>) -> Vec<LoraEntry> {
    let Some(Value::Array(items)) = flat_value(obj, FLAT_LORA_KEYS) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(LoraEntry::new(Some(name), None)),
            Value::Object(entry) => Some(LoraEntry::new(
                entry.get("name").and_then(Value::as_str),
                entry.get("weight").and_then(Value::as_f64),
            )),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
