//! Named agents and the workflow nodes that wrap them.

pub mod general;
pub mod news;
pub mod summarizer;
pub mod worker;

pub use general::{general_agent, GENERAL_PROMPT};
pub use news::{news_agent, NEWS_PROMPT};
pub use summarizer::{summarizer_agent, SummarizerNode, SUMMARIZER_PROMPT};
pub use worker::WorkerNode;
