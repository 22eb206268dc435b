use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use super::ToolDefinition;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RemoveSlideInput {
    #[schemars(description = "Identifier of the slide to remove.")]
    pub slug: String,
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "removeSlide",
        description: "Remove a slide from the presentation. The remaining slides keep their order.",
        input_schema: serde_json::to_value(schema_for!(RemoveSlideInput)).unwrap_or_default(),
    }
}
