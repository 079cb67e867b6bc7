pub mod patterns;
pub mod normalize;
pub mod deidentify;
pub mod course;
pub mod sections;
pub mod report;
pub mod processor;
pub mod ingest; // Patient folders and JSON-lines row exports
pub mod storage;
pub mod assemble;
pub mod dispatch; // LLM batch dispatch, outside the normalization core
