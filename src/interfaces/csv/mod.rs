pub mod catalog_reader;
pub mod report_writer;
pub mod request_reader;
