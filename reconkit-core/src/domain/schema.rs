//! Column roles and per-side schema declarations

use serde::{Deserialize, Serialize};

use super::result::ConfigError;

/// Semantic role of a column within one dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Key,
    Date,
    Amount,
    Description,
    Other,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Key => "key",
            ColumnRole::Date => "date",
            ColumnRole::Amount => "amount",
            ColumnRole::Description => "description",
            ColumnRole::Other => "other",
        }
    }
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column assignments for one side of a reconciliation, as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideSchema {
    pub key_column: String,
    pub date_column: String,
    pub amount_column: String,
    #[serde(default)]
    pub description_column: Option<String>,
}

impl SideSchema {
    pub fn new(
        key_column: impl Into<String>,
        date_column: impl Into<String>,
        amount_column: impl Into<String>,
    ) -> Self {
        Self {
            key_column: key_column.into(),
            date_column: date_column.into(),
            amount_column: amount_column.into(),
            description_column: None,
        }
    }

    pub fn with_description(mut self, column: impl Into<String>) -> Self {
        self.description_column = Some(column.into());
        self
    }

    /// Declared (role, column) pairs; all of them must exist in the source header
    pub fn declared(&self) -> Vec<(ColumnRole, &str)> {
        let mut declared = vec![
            (ColumnRole::Key, self.key_column.as_str()),
            (ColumnRole::Date, self.date_column.as_str()),
            (ColumnRole::Amount, self.amount_column.as_str()),
        ];
        if let Some(desc) = &self.description_column {
            declared.push((ColumnRole::Description, desc.as_str()));
        }
        declared
    }

    /// Reject empty column names and a column claimed by two roles
    pub fn validate(&self) -> Result<(), ConfigError> {
        let declared = self.declared();
        for (role, column) in &declared {
            if column.trim().is_empty() {
                return Err(ConfigError::EmptyColumn(role.to_string()));
            }
        }
        for (i, (role, column)) in declared.iter().enumerate() {
            if let Some((other, _)) = declared[i + 1..].iter().find(|(_, c)| c == column) {
                return Err(ConfigError::DuplicateRole {
                    column: column.to_string(),
                    first: role.to_string(),
                    second: other.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A resolved column: header name, position, and role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub role: ColumnRole,
}

/// Resolved schema of a loaded dataset, in header order
///
/// Exactly one key, date and amount column; at most one description column.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
    key: usize,
    date: usize,
    amount: usize,
    description: Option<usize>,
}

impl Schema {
    /// Resolve a side schema against a header row.
    ///
    /// Returns the name of the first declared column missing from the header.
    pub fn resolve(side: &SideSchema, headers: &[String]) -> Result<Self, (ColumnRole, String)> {
        let position = |role: ColumnRole, name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| (role, name.to_string()))
        };

        let key = position(ColumnRole::Key, &side.key_column)?;
        let date = position(ColumnRole::Date, &side.date_column)?;
        let amount = position(ColumnRole::Amount, &side.amount_column)?;
        let description = match &side.description_column {
            Some(name) => Some(position(ColumnRole::Description, name)?),
            None => None,
        };

        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let role = if i == key {
                    ColumnRole::Key
                } else if i == date {
                    ColumnRole::Date
                } else if i == amount {
                    ColumnRole::Amount
                } else if Some(i) == description {
                    ColumnRole::Description
                } else {
                    ColumnRole::Other
                };
                ColumnSpec {
                    name: name.clone(),
                    role,
                }
            })
            .collect();

        Ok(Self {
            columns,
            key,
            date,
            amount,
            description,
        })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn role_of(&self, index: usize) -> Option<ColumnRole> {
        self.columns.get(index).map(|c| c.role)
    }

    pub fn key_index(&self) -> usize {
        self.key
    }

    pub fn date_index(&self) -> usize {
        self.date
    }

    pub fn amount_index(&self) -> usize {
        self.amount
    }

    pub fn description_index(&self) -> Option<usize> {
        self.description
    }

    pub fn key_name(&self) -> &str {
        &self.columns[self.key].name
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_assigns_roles_in_header_order() {
        let side = SideSchema::new("ref", "posted", "amt").with_description("memo");
        let schema = Schema::resolve(&side, &headers(&["posted", "ref", "memo", "amt", "branch"])).unwrap();

        let roles: Vec<ColumnRole> = schema.columns().iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                ColumnRole::Date,
                ColumnRole::Key,
                ColumnRole::Description,
                ColumnRole::Amount,
                ColumnRole::Other
            ]
        );
        assert_eq!(schema.key_name(), "ref");
        assert_eq!(schema.description_index(), Some(2));
    }

    #[test]
    fn test_resolve_reports_missing_column() {
        let side = SideSchema::new("ref", "date", "amount");
        let err = Schema::resolve(&side, &headers(&["ref", "date"])).unwrap_err();
        assert_eq!(err, (ColumnRole::Amount, "amount".to_string()));
    }

    #[test]
    fn test_validate_rejects_shared_column() {
        let side = SideSchema::new("id", "id", "amount");
        let err = side.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateRole {
                column: "id".into(),
                first: "key".into(),
                second: "date".into()
            }
        );
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let side = SideSchema::new("id", "date", "  ");
        assert_eq!(side.validate().unwrap_err(), ConfigError::EmptyColumn("amount".into()));
    }
}
