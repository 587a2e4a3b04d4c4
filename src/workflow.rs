//! The backend workflow template: a JSON node graph with named parameter
//! slots filled in per submission.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;

/// Node ids of the parameter slots the template must carry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SlotIds {
    #[serde(default = "SlotIds::default_prompt_node")]
    pub prompt_node: String,
    #[serde(default = "SlotIds::default_image_node")]
    pub image_node: String,
    #[serde(default = "SlotIds::default_mask_node")]
    pub mask_node: String,
    #[serde(default = "SlotIds::default_original_node")]
    pub original_node: String,
    #[serde(default = "SlotIds::default_seed_node")]
    pub seed_node: String,
}

impl SlotIds {
    fn default_prompt_node() -> String {
        "159".into()
    }
    fn default_image_node() -> String {
        "18".into()
    }
    fn default_mask_node() -> String {
        "11".into()
    }
    fn default_original_node() -> String {
        "151".into()
    }
    fn default_seed_node() -> String {
        "3".into()
    }
}

impl Default for SlotIds {
    fn default() -> Self {
        Self {
            prompt_node: Self::default_prompt_node(),
            image_node: Self::default_image_node(),
            mask_node: Self::default_mask_node(),
            original_node: Self::default_original_node(),
            seed_node: Self::default_seed_node(),
        }
    }
}

/// Per-submission values for the template slots.
#[derive(Debug, Clone, Copy)]
pub struct RenderParams<'a> {
    pub prompt: &'a str,
    pub source_path: &'a str,
    pub mask_path: &'a str,
    pub original_path: &'a str,
    pub seed: u64,
}

/// A validated workflow graph. Loading fails fast when the file or any
/// configured slot is missing, before any interface work happens.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    graph: Value,
    slots: SlotIds,
}

impl WorkflowTemplate {
    pub fn load(path: &Path, slots: SlotIds) -> Result<Self, Error> {
        let text =
            fs::read_to_string(path).map_err(|_| Error::MissingTemplate(path.to_path_buf()))?;
        let graph: Value = serde_json::from_str(&text)?;
        let template = Self { graph, slots };
        template.require_slot(&template.slots.prompt_node, "prompt")?;
        template.require_slot(&template.slots.image_node, "source image")?;
        template.require_slot(&template.slots.mask_node, "mask image")?;
        template.require_slot(&template.slots.original_node, "original image")?;
        template.require_slot(&template.slots.seed_node, "seed")?;
        debug!(path = %path.display(), "workflow template loaded");
        Ok(template)
    }

    fn require_slot(&self, node: &str, role: &'static str) -> Result<(), Error> {
        let ok = self
            .graph
            .get(node)
            .and_then(|n| n.get("inputs"))
            .is_some_and(Value::is_object);
        if ok {
            Ok(())
        } else {
            Err(Error::MissingSlot {
                role,
                node: node.to_string(),
            })
        }
    }

    /// Produce a submission-ready graph with all slots filled.
    pub fn instantiate(&self, params: &RenderParams<'_>) -> Value {
        let mut graph = self.graph.clone();
        set_input(&mut graph, &self.slots.prompt_node, "value", params.prompt.into());
        set_input(&mut graph, &self.slots.image_node, "image", params.source_path.into());
        set_input(&mut graph, &self.slots.mask_node, "image", params.mask_path.into());
        set_input(
            &mut graph,
            &self.slots.original_node,
            "image",
            params.original_path.into(),
        );
        set_input(&mut graph, &self.slots.seed_node, "seed", params.seed.into());
        graph
    }
}

fn set_input(graph: &mut Value, node: &str, key: &str, value: Value) {
    // Slots were validated at load time; a missing node here is a bug.
    if let Some(inputs) = graph
        .get_mut(node)
        .and_then(|n| n.get_mut("inputs"))
        .and_then(Value::as_object_mut)
    {
        inputs.insert(key.to_string(), value);
    }
}
