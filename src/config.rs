// src/config.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::schema::{
    rules::{ColumnRules, Exclusion},
    types::{CategoryLabelSet, EmployeeCategory},
};

/// Canonical column labels the normalizer reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLabels {
    pub name: String,
    pub department: String,
    pub title: String,
    pub hire_date: String,
    pub separation_date: String,
    pub category: String,
    pub remark: String,
    pub contract_type: String,
}

impl Default for ColumnLabels {
    fn default() -> Self {
        Self {
            name: "성명".into(),
            department: "부서명".into(),
            title: "직급명".into(),
            hire_date: "입사일".into(),
            separation_date: "퇴사일".into(),
            category: "사원구분명".into(),
            remark: "Remark".into(),
            contract_type: "Contract Type".into(),
        }
    }
}

/// Contract-type substring → category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRule {
    pub contains: String,
    pub category: EmployeeCategory,
}

/// Names of the two workbook-wide detail sheets and their origin column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSheetNames {
    pub hires: String,
    pub departures: String,
    pub origin_column: String,
}

impl Default for DetailSheetNames {
    fn default() -> Self {
        Self {
            hires: "입사자 명단".into(),
            departures: "퇴사자 명단".into(),
            origin_column: "시트명".into(),
        }
    }
}

/// Organizational constants. Every field is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// First-cell values that mark a header row (case-sensitive).
    pub header_sentinels: Vec<String>,
    /// Input base names that go first, in this order.
    pub sheet_priority: Vec<String>,
    /// Source label → canonical label.
    pub aliases: BTreeMap<String, String>,
    pub columns: ColumnLabels,
    /// Remarks starting with this mark the row as separated last month.
    pub remark_prefix: String,
    /// Applied in order; a later match overwrites an earlier one.
    pub contract_rules: Vec<ContractRule>,
    pub exclusions: Vec<Exclusion>,
    pub detail_sheets: DetailSheetNames,
}

impl Default for RuleSet {
    fn default() -> Self {
        let columns = ColumnLabels::default();
        let mut aliases = BTreeMap::new();
        aliases.insert("Starting Date".to_string(), columns.hire_date.clone());
        Self {
            header_sentinels: vec!["No".into(), "NO".into()],
            sheet_priority: Vec::new(),
            aliases,
            columns,
            remark_prefix: "Resigned and last working".into(),
            contract_rules: vec![
                ContractRule {
                    contains: "FDC".into(),
                    category: EmployeeCategory::Contract,
                },
                ContractRule {
                    contains: "UDC".into(),
                    category: EmployeeCategory::Regular,
                },
            ],
            exclusions: Vec::new(),
            detail_sheets: DetailSheetNames::default(),
        }
    }
}

impl RuleSet {
    /// Load a YAML rule file; absent fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading rule file {:?}", path))?;
        Self::from_yaml(&text).with_context(|| format!("loading rule file {:?}", path))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let rules: RuleSet = serde_yaml::from_str(text).context("parsing YAML rules")?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<()> {
        if self.header_sentinels.iter().all(|s| s.trim().is_empty()) {
            bail!("header_sentinels must name at least one value");
        }
        if self.contract_rules.iter().any(|r| r.contains.is_empty()) {
            bail!("contract rule with empty `contains` would match every row");
        }
        let c = &self.columns;
        for (field, label) in [
            ("name", &c.name),
            ("department", &c.department),
            ("title", &c.title),
            ("hire_date", &c.hire_date),
            ("separation_date", &c.separation_date),
            ("category", &c.category),
            ("remark", &c.remark),
            ("contract_type", &c.contract_type),
        ] {
            if label.trim().is_empty() {
                bail!("column label `{}` is empty", field);
            }
        }
        let d = &self.detail_sheets;
        if d.hires.trim().is_empty() || d.departures.trim().is_empty() {
            bail!("detail sheet names must not be empty");
        }
        Ok(())
    }
}

/// Per-run switches.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub copy_formatting: bool,
    pub detail_sheets: bool,
    pub labels: CategoryLabelSet,
    pub column_rules: ColumnRules,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            copy_formatting: false,
            detail_sheets: true,
            labels: CategoryLabelSet::Korean,
            column_rules: ColumnRules::default(),
        }
    }
}
