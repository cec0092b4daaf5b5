pub mod builtin;
pub mod registry;

pub use builtin::calculator::CalculatorTool;
pub use builtin::news::NewsTool;
pub use registry::ToolRegistry;
