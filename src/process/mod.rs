// src/process/mod.rs
pub mod date_parser;
pub mod header;
pub mod layout;
pub mod merge;
pub mod order;
pub mod raw_table;
pub mod reader;
pub mod report;
pub mod utils;
pub mod writer;

pub use header::{locate_header, HeaderSource, Located};
pub use merge::{merge_inputs, MergeOptions, MergeResult, MergedSheet};
pub use raw_table::{CellValue, HeaderedTable, RawSheet};
pub use reader::{read_workbook, SourceWorkbook};
pub use report::{FileOutcome, FileReport, RunReport, SheetOutcome, SheetReport};
pub use writer::WorkbookWriter;
