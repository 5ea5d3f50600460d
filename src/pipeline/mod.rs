pub mod chat;
pub mod draft;
pub mod extraction;
pub mod import;
pub mod ollama;
pub mod orchestrator; // upload → blob → record → analysis → terminal state
pub mod records;
