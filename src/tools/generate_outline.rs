use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use super::ToolDefinition;

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct GenerateOutlineInput {
    #[schemars(description = "Topic of the presentation about to be outlined.")]
    #[serde(default)]
    pub topic: String,
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "generateOutline",
        description: "Start a new presentation. Clears every existing slide so the outline can be added slide by slide with addSlide.",
        input_schema: serde_json::to_value(schema_for!(GenerateOutlineInput)).unwrap_or_default(),
    }
}
