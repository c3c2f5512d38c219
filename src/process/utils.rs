use std::path::Path;

/// Excel sheet name maximum length.
pub const SHEET_NAME_MAX_LEN: usize = 31;
/// Characters not allowed in sheet names.
const SHEET_NAME_ILLEGAL: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// 2) File name without directories and without the last extension.
pub fn base_name(file_name: &str) -> String {
    // archive entries always use '/', uploads from Windows may carry '\'
    let last = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(last)
        .to_string()
}

/// 3) Lower-cased extension of a file name, if any.
pub fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}

/// 4) Split a free-text comma-separated list, dropping blank items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(clean_str)
        .filter(|s| !s.is_empty())
        .collect()
}

/// 5) Replace invalid chars and trim to a valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if SHEET_NAME_ILLEGAL.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim().trim_matches('\'');
    let name = match trimmed {
        "" => "Sheet",
        // reserved by Excel
        t if t.eq_ignore_ascii_case("history") => "History_",
        t => t,
    };
    truncate_chars(name, SHEET_NAME_MAX_LEN)
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_dirs_and_extension() {
        assert_eq!(base_name("exports/도이치오토월드.xlsx"), "도이치오토월드");
        assert_eq!(base_name("C:\\tmp\\branch.v2.xlsx"), "branch.v2");
        assert_eq!(base_name("plain"), "plain");
    }

    #[test]
    fn split_list_ignores_blanks() {
        assert_eq!(split_list("성명, 입사일,, 퇴사일 ,"), vec!["성명", "입사일", "퇴사일"]);
        assert!(split_list("  ").is_empty());
        assert_eq!(split_list("\"Remark\", 비고"), vec!["Remark", "비고"]);
    }

    #[test]
    fn sheet_names_are_sanitized_and_capped() {
        assert_eq!(sanitize_sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_sheet_name("   "), "Sheet");
        let long = "가".repeat(40);
        assert_eq!(sanitize_sheet_name(&long).chars().count(), SHEET_NAME_MAX_LEN);
    }

    #[test]
    fn clean_str_strips_quotes() {
        assert_eq!(clean_str("  \"Remark\" "), "Remark");
        assert_eq!(clean_str(" 입사일 "), "입사일");
    }
}
