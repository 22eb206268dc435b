use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use super::ToolDefinition;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct NavigateSlideInput {
    #[schemars(description = "Identifier of the slide to show.")]
    pub slug: String,
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "navigateSlide",
        description: "Show the slide with the given slug to the audience.",
        input_schema: serde_json::to_value(schema_for!(NavigateSlideInput)).unwrap_or_default(),
    }
}
