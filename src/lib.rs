//! Document tools for agents: a remote PDF reader and a text statistics
//! analyzer, served over the Model Context Protocol.
//!
//! The two operations are also usable directly:
//! [`utils::pdf_reader::PdfExtractionPipeline::extract_text`] and
//! [`utils::text_analysis::analyze`]. Both always return text.

pub mod mcp;
pub mod tools;
pub mod utils;
