pub mod pdf_reader_tool;
pub mod text_analyzer_tool;
