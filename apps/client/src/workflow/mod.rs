// Workflow core: one engine instance owns the mutable state and every
// transition. Remote calls go through the ResumeService trait only; the
// engine never touches the network directly.

pub mod engine;
pub mod state;
