mod add_slide;
mod generate_outline;
mod modify_slide;
mod navigate_slide;
mod remove_slide;

pub use add_slide::AddSlideInput;
pub use generate_outline::GenerateOutlineInput;
pub use modify_slide::ModifySlideInput;
pub use navigate_slide::NavigateSlideInput;
pub use remove_slide::RemoveSlideInput;

use crate::protocol::ToolDef;

/// A function the assistant may call, advertised in `session.update`.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn to_wire(&self) -> ToolDef {
        ToolDef {
            tool_type: "function".to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.input_schema.clone(),
        }
    }
}

pub fn slide_tools() -> Vec<ToolDefinition> {
    vec![
        generate_outline::definition(),
        add_slide::definition(),
        modify_slide::definition(),
        remove_slide::definition(),
        navigate_slide::definition(),
    ]
}
