//! Similarity search over a loaded index and context budgeting for prompts

mod budget;
mod retriever;

pub use budget::{CHARS_PER_TOKEN, ContextBudget, render_numbered};
pub use retriever::{RetrievedChunk, Retriever};
