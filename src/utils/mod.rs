pub mod content_guard;
pub mod fetch;
pub mod pdf;
pub mod pdf_reader;
pub mod text_analysis;
