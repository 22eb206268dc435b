use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use super::ToolDefinition;
use crate::deck::SlideTemplate;

/// Only `slug` is required; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModifySlideInput {
    #[schemars(description = "Identifier of the slide to change.")]
    pub slug: String,
    #[schemars(description = "New layout of the slide.")]
    #[serde(default)]
    pub template: Option<SlideTemplate>,
    #[schemars(description = "New slide title.")]
    #[serde(default)]
    pub title: Option<String>,
    #[schemars(description = "New bullet points.")]
    #[serde(default)]
    pub items: Option<Vec<String>>,
    #[schemars(description = "New image URL.")]
    #[serde(default)]
    pub image_url: Option<String>,
    #[schemars(description = "New paragraph of text.")]
    #[serde(default)]
    pub paragraph: Option<String>,
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "modifySlide",
        description: "Change fields of an existing slide, identified by its slug. Fields that are left out keep their current value.",
        input_schema: serde_json::to_value(schema_for!(ModifySlideInput)).unwrap_or_default(),
    }
}
