//! Reconcile heterogeneous HR sheets onto the canonical columns.
//!
//! Normalization never drops rows. It renames aliased labels, strips label
//! whitespace, synthesizes the separation-date and category columns when a
//! sheet lacks them, fills them from remarks and contract types, and turns the
//! two date columns into real dates (or empty cells).

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    config::RuleSet,
    period::ReferencePeriod,
    process::{
        date_parser::parse_date,
        raw_table::{CellValue, HeaderedTable},
    },
    schema::types::{CanonicalRecord, CategoryLabelSet, EmployeeCategory},
};

/// A row whose contract type matched more than one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousRow {
    pub row: usize,
    pub contract_type: String,
    /// Every matching category, in rule order; the last one was applied.
    pub matched: Vec<EmployeeCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    /// Canonical columns that were absent and got appended.
    pub synthesized_columns: Vec<String>,
    /// Rows whose separation date came from the remark prefix.
    pub remark_separations: usize,
    /// Rows whose category came from a contract-type rule.
    pub categorized_by_contract: usize,
    pub ambiguous_rows: Vec<AmbiguousRow>,
    /// Non-empty date cells that could not be parsed.
    pub unparsed_dates: usize,
}

/// Run every normalization step over a copy of `table`.
pub fn normalize(
    table: &HeaderedTable,
    rules: &RuleSet,
    labels: CategoryLabelSet,
    period: &ReferencePeriod,
) -> (HeaderedTable, NormalizeReport) {
    let cols = &rules.columns;
    let mut out = table.clone();
    let mut report = NormalizeReport::default();

    // 1) aliases: raw label first, then its trimmed form
    out.rename_columns(|label| {
        rules
            .aliases
            .get(label)
            .or_else(|| rules.aliases.get(label.trim()))
            .cloned()
            .unwrap_or_else(|| label.to_string())
    });

    // 2) strip label whitespace
    out.rename_columns(|label| label.trim().to_string());

    // 3) separation date column
    let sep_idx = match out.column_index(&cols.separation_date) {
        Some(idx) => idx,
        None => {
            report.synthesized_columns.push(cols.separation_date.clone());
            out.push_column(&cols.separation_date, CellValue::Empty)
        }
    };

    // 4) remark prefix → separated on the last day of the previous month
    if let Some(remark_idx) = out.column_index(&cols.remark) {
        let last_day = period
            .previous_month_last_day
            .and_hms_opt(0, 0, 0)
            .map(CellValue::Date)
            .unwrap_or_default();
        for row in &mut out.rows {
            let hit = row[remark_idx]
                .as_text()
                .is_some_and(|t| t.starts_with(rules.remark_prefix.as_str()));
            if hit {
                row[sep_idx] = last_day.clone();
                report.remark_separations += 1;
            }
        }
    }

    // 5) category column
    let cat_idx = match out.column_index(&cols.category) {
        Some(idx) => idx,
        None => {
            report.synthesized_columns.push(cols.category.clone());
            out.push_column(&cols.category, CellValue::Empty)
        }
    };

    // 6) contract-type rules, last match wins
    if let Some(ct_idx) = out.column_index(&cols.contract_type) {
        for (r, row) in out.rows.iter_mut().enumerate() {
            let Some(contract) = row[ct_idx].as_text() else {
                continue;
            };
            let matched: Vec<EmployeeCategory> = rules
                .contract_rules
                .iter()
                .filter(|rule| contract.contains(rule.contains.as_str()))
                .map(|rule| rule.category)
                .collect();
            let Some(last) = matched.last().copied() else {
                continue;
            };
            row[cat_idx] = CellValue::Text(last.label(labels).to_string());
            report.categorized_by_contract += 1;
            if matched.len() > 1 {
                warn!(row = r, contract_type = %contract, applied = ?last, "contract type matches several rules");
                report.ambiguous_rows.push(AmbiguousRow {
                    row: r,
                    contract_type: contract,
                    matched,
                });
            }
        }
    }

    // 7) dates
    let date_cols: Vec<usize> = [&cols.hire_date, &cols.separation_date]
        .into_iter()
        .filter_map(|label| out.column_index(label))
        .collect();
    for row in &mut out.rows {
        for &idx in &date_cols {
            let cell = &mut row[idx];
            if cell.is_empty() {
                *cell = CellValue::Empty;
                continue;
            }
            *cell = match parse_date(cell).and_then(|d| d.and_hms_opt(0, 0, 0)) {
                Some(dt) => CellValue::Date(dt),
                None => {
                    report.unparsed_dates += 1;
                    CellValue::Empty
                }
            };
        }
    }

    debug!(
        synthesized = ?report.synthesized_columns,
        remark_separations = report.remark_separations,
        unparsed_dates = report.unparsed_dates,
        "normalized"
    );
    (out, report)
}

/// Read canonical records out of a normalized table.
pub fn extract_records(table: &HeaderedTable, rules: &RuleSet) -> Vec<CanonicalRecord> {
    let cols = &rules.columns;
    let idx = |label: &str| table.column_index(label);
    let (name, dept, title) = (idx(&cols.name), idx(&cols.department), idx(&cols.title));
    let (hire, sep, cat) = (
        idx(&cols.hire_date),
        idx(&cols.separation_date),
        idx(&cols.category),
    );

    table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let text = |i: Option<usize>| -> Option<String> {
                let t = row[i?].as_text()?.trim().to_string();
                (!t.is_empty()).then_some(t)
            };
            let date = |i: Option<usize>| -> Option<NaiveDate> { parse_date(&row[i?]) };
            let raw_category = text(cat);
            let employee_category = raw_category.as_deref().and_then(EmployeeCategory::from_label);
            CanonicalRecord {
                row: r,
                employee_name: text(name),
                department: text(dept),
                title: text(title),
                hire_date: date(hire),
                separation_date: date(sep),
                category_label: raw_category.filter(|_| employee_category.is_none()),
                employee_category,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractRule;

    fn period() -> ReferencePeriod {
        ReferencePeriod::from_date(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap())
    }

    fn t(s: &str) -> CellValue {
        CellValue::from(s)
    }

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn contract_type_synthesizes_category_and_alias_renames_hire_date() {
        let table = HeaderedTable::new(
            labels(&["No", " Starting Date", "Contract Type"]),
            vec![vec![CellValue::Number(1.0), t("2024-05-03"), t("FDC-12M")]],
        );
        let rules = RuleSet::default();
        let (out, report) = normalize(&table, &rules, CategoryLabelSet::Korean, &period());

        assert_eq!(out.columns, labels(&["No", "입사일", "Contract Type", "퇴사일", "사원구분명"]));
        assert_eq!(report.synthesized_columns, labels(&["퇴사일", "사원구분명"]));
        assert_eq!(out.get(0, "사원구분명"), Some(&t("계약직")));
        assert_eq!(out.get(0, "퇴사일"), Some(&CellValue::Empty));

        let recs = extract_records(&out, &rules);
        assert_eq!(recs[0].hire_date, NaiveDate::from_ymd_opt(2024, 5, 3));
        assert_eq!(recs[0].employee_category, Some(EmployeeCategory::Contract));
        assert_eq!(recs[0].separation_date, None);
    }

    #[test]
    fn remark_prefix_sets_separation_without_column() {
        let table = HeaderedTable::new(
            labels(&["성명", "Remark"]),
            vec![
                vec![t("김민수"), t("Resigned and last working day is 2024-04-30")],
                vec![t("이영희"), t("on leave")],
                vec![t("박철수"), CellValue::Empty],
            ],
        );
        let rules = RuleSet::default();
        let (out, report) = normalize(&table, &rules, CategoryLabelSet::Korean, &period());
        assert_eq!(report.remark_separations, 1);

        let recs = extract_records(&out, &rules);
        assert_eq!(recs[0].separation_date, NaiveDate::from_ymd_opt(2024, 5, 31));
        assert_eq!(recs[1].separation_date, None);
        assert_eq!(recs[2].separation_date, None);
    }

    #[test]
    fn both_rules_matching_is_flagged_and_last_wins() {
        let table = HeaderedTable::new(
            labels(&["Contract Type"]),
            vec![vec![t("FDC→UDC")], vec![t("UDC")]],
        );
        let (out, report) = normalize(&table, &RuleSet::default(), CategoryLabelSet::English, &period());
        assert_eq!(out.get(0, "사원구분명"), Some(&t("Regular")));
        assert_eq!(report.ambiguous_rows.len(), 1);
        assert_eq!(report.ambiguous_rows[0].row, 0);
        assert_eq!(
            report.ambiguous_rows[0].matched,
            vec![EmployeeCategory::Contract, EmployeeCategory::Regular]
        );
        assert_eq!(report.categorized_by_contract, 2);
    }

    #[test]
    fn existing_category_is_kept_unless_a_rule_matches() {
        let table = HeaderedTable::new(
            labels(&["사원구분명", "Contract Type"]),
            vec![
                vec![t("임원"), CellValue::Empty],
                vec![t("파견직"), t("FDC")],
                vec![t("인턴"), t("n/a")],
            ],
        );
        let rules = RuleSet::default();
        let (out, report) = normalize(&table, &rules, CategoryLabelSet::Korean, &period());
        assert!(report.synthesized_columns.contains(&"퇴사일".to_string()));
        assert!(!report.synthesized_columns.contains(&"사원구분명".to_string()));

        let recs = extract_records(&out, &rules);
        assert_eq!(recs[0].employee_category, Some(EmployeeCategory::Executive));
        assert_eq!(recs[1].employee_category, Some(EmployeeCategory::Contract));
        assert_eq!(recs[2].employee_category, None);
        assert_eq!(recs[2].category_label.as_deref(), Some("인턴"));
    }

    #[test]
    fn unparsable_dates_become_empty() {
        let table = HeaderedTable::new(
            labels(&["입사일", "퇴사일"]),
            vec![
                vec![t("재직중"), t("  ")],
                vec![CellValue::Number(45415.0), t("2024.05.31.")],
            ],
        );
        let (out, report) = normalize(&table, &RuleSet::default(), CategoryLabelSet::Korean, &period());
        assert_eq!(report.unparsed_dates, 1);
        assert_eq!(out.rows[0][0], CellValue::Empty);
        assert_eq!(out.rows[0][1], CellValue::Empty);
        assert!(matches!(out.rows[1][0], CellValue::Date(_)));
        assert!(matches!(out.rows[1][1], CellValue::Date(_)));
    }

    #[test]
    fn whitespace_collisions_are_deduplicated() {
        let table = HeaderedTable::new(labels(&["성명", "성명 "]), vec![vec![t("a"), t("b")]]);
        let (out, _) = normalize(&table, &RuleSet::default(), CategoryLabelSet::Korean, &period());
        assert_eq!(out.columns[..2], labels(&["성명", "성명.1"])[..]);
    }

    #[test]
    fn custom_rules_apply_in_order() {
        let mut rules = RuleSet::default();
        rules.contract_rules = vec![
            ContractRule {
                contains: "TMP".into(),
                category: EmployeeCategory::Dispatched,
            },
            ContractRule {
                contains: "EXEC".into(),
                category: EmployeeCategory::Executive,
            },
        ];
        let table = HeaderedTable::new(labels(&["Contract Type"]), vec![vec![t("TMP")], vec![t("FDC")]]);
        let (out, report) = normalize(&table, &rules, CategoryLabelSet::Korean, &period());
        assert_eq!(out.get(0, "사원구분명"), Some(&t("파견직")));
        assert_eq!(out.get(1, "사원구분명"), Some(&CellValue::Empty));
        assert!(report.ambiguous_rows.is_empty());
    }
}
