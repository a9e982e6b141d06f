// Pipeline execution and monitoring module
// Worker pool, per-split stage executors, and the JSONL progress trace

pub mod pool;
pub mod stages;
pub mod trace;

pub use pool::{resolve_n_jobs, WorkerPool};
pub use stages::{
    apply_modifier, clean_split, generate_features, load_split, CleanOutput, GenerationOutput,
    LoadMode, LoadOutput,
};
pub use trace::{read_trace_file, TraceBuilder, TraceEntry, TraceError, TraceWriter};
