use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use super::ToolDefinition;
use crate::deck::SlideTemplate;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddSlideInput {
    #[schemars(description = "Short unique identifier of the slide, used to modify, remove or navigate to it later.")]
    pub slug: String,
    #[schemars(description = "Layout of the slide. Bullet items need title_image_bullets, a paragraph needs title_image_paragraph.")]
    pub template: SlideTemplate,
    #[schemars(description = "Slide title.")]
    pub title: String,
    #[schemars(description = "Bullet points. Only with the title_image_bullets template, never together with a paragraph.")]
    #[serde(default)]
    pub items: Option<Vec<String>>,
    #[schemars(description = "URL of an image to show on the slide.")]
    #[serde(default)]
    pub image_url: Option<String>,
    #[schemars(description = "A paragraph of text. Only with the title_image_paragraph template, never together with items.")]
    #[serde(default)]
    pub paragraph: Option<String>,
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "addSlide",
        description: "Append a slide to the end of the presentation.\n\nA slide shows either bullet items or a paragraph, never both, and the template must support whichever one is given.",
        input_schema: serde_json::to_value(schema_for!(AddSlideInput)).unwrap_or_default(),
    }
}
