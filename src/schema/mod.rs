pub mod normalize;
pub mod rules;
pub mod types;

pub use normalize::{extract_records, normalize, AmbiguousRow, NormalizeReport};
pub use rules::{apply_exclusions, excluded_rows, ColumnRules, Exclusion};
pub use types::{CanonicalRecord, CategoryLabelSet, EmployeeCategory, YearMonth};
