//! Participant roster: the registration list that supplies stable ids,
//! gender and department for names found in period sheets.

use crate::error::{LeaderboardError, Result, SchemaError};
use crate::model::{Gender, ParticipantIdentity};
use crate::table::PeriodTable;
use std::collections::HashMap;
use std::path::Path;

const ROSTER_ID_HEADERS: &[&str] = &["id", "帳號", "帳號(最新8/8)2", "account"];
const ROSTER_NAME_HEADERS: &[&str] = &["姓名", "name", "參與者姓名"];
const ROSTER_GENDER_HEADERS: &[&str] = &["性別", "gender"];
const ROSTER_DEPARTMENT_HEADERS: &[&str] = &["所屬部門", "department", "部門"];

/// Outcome of looking a bare name up in the roster.
#[derive(Debug, Clone, PartialEq)]
pub enum NameLookup<'a> {
    Unique(&'a ParticipantIdentity),
    /// Several roster entries share the name; carries their ids.
    Ambiguous(Vec<String>),
    Missing,
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<ParticipantIdentity>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl Roster {
    pub fn new(entries: Vec<ParticipantIdentity>) -> Self {
        let mut roster = Roster::default();
        for entry in entries {
            roster.insert(entry);
        }
        roster
    }

    fn insert(&mut self, entry: ParticipantIdentity) {
        let idx = self.entries.len();
        if let Some(id) = &entry.id {
            if self.by_id.contains_key(id) {
                log::warn!("Roster: duplicate id {} ignored for '{}'", id, entry.name);
                return;
            }
            self.by_id.insert(id.clone(), idx);
        }
        self.by_name.entry(entry.name.clone()).or_default().push(idx);
        self.entries.push(entry);
    }

    /// Read a roster CSV or the first sheet of a roster workbook.
    pub fn read(path: &Path) -> Result<Self> {
        let table = PeriodTable::read(path, "roster", None)?;
        let roster = Self::from_table(&table)?;
        log::info!("Loaded roster {}: {} participants", path.display(), roster.len());
        Ok(roster)
    }

    pub fn from_table(table: &PeriodTable) -> Result<Self> {
        let name_col = table.find_exact(ROSTER_NAME_HEADERS).ok_or_else(|| {
            LeaderboardError::Schema(SchemaError {
                period: table.period.clone(),
                column: "name".to_string(),
            })
        })?;
        let id_col = table.find_exact(ROSTER_ID_HEADERS);
        let gender_col = table.find_exact(ROSTER_GENDER_HEADERS);
        let department_col = table.find_exact(ROSTER_DEPARTMENT_HEADERS);

        let optional = |row: usize, col: Option<usize>| {
            col.map(|c| table.cell(row, c).trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let mut entries = Vec::new();
        for row in 0..table.rows.len() {
            let name = table.cell(row, name_col).trim();
            if name.is_empty() {
                continue;
            }
            entries.push(ParticipantIdentity {
                id: optional(row, id_col),
                name: name.to_string(),
                gender: optional(row, gender_col)
                    .map(|g| Gender::parse(&g))
                    .unwrap_or(Gender::Unknown),
                department: optional(row, department_col),
            });
        }
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&ParticipantIdentity> {
        self.by_id.get(id.trim()).map(|&i| &self.entries[i])
    }

    pub fn by_name(&self, name: &str) -> NameLookup<'_> {
        match self.by_name.get(name.trim()).map(|v| v.as_slice()) {
            None | Some([]) => NameLookup::Missing,
            Some([only]) => NameLookup::Unique(&self.entries[*only]),
            Some(many) => NameLookup::Ambiguous(
                many.iter()
                    .map(|&i| self.entries[i].id.clone().unwrap_or_default())
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_table() -> PeriodTable {
        PeriodTable::parse_csv(
            "帳號(最新8/8)2,姓名,性別,所屬部門\n\
             A01,Chen,生理女,R&D\n\
             A02,Lin,生理男,Sales\n\
             A03,Wang,生理女,HR\n\
             A04,Wang,生理男,Ops\n\
             ,Solo,,\n",
            "roster",
        )
        .unwrap()
    }

    #[test]
    fn test_roster_lookups() {
        let roster = Roster::from_table(&roster_table()).unwrap();
        assert_eq!(roster.len(), 5);

        let chen = roster.by_id("A01").unwrap();
        assert_eq!(chen.name, "Chen");
        assert_eq!(chen.gender, Gender::Female);
        assert_eq!(chen.department.as_deref(), Some("R&D"));

        match roster.by_name("Lin") {
            NameLookup::Unique(p) => assert_eq!(p.id.as_deref(), Some("A02")),
            other => panic!("expected unique, got {:?}", other),
        }
        assert_eq!(
            roster.by_name("Wang"),
            NameLookup::Ambiguous(vec!["A03".to_string(), "A04".to_string()])
        );
        assert_eq!(roster.by_name("Nobody"), NameLookup::Missing);

        match roster.by_name("Solo") {
            NameLookup::Unique(p) => {
                assert!(p.id.is_none());
                assert_eq!(p.gender, Gender::Unknown);
            }
            other => panic!("expected unique, got {:?}", other),
        }
    }

    #[test]
    fn test_roster_requires_name_column() {
        let table = PeriodTable::parse_csv("id,gender\n1,F\n", "roster").unwrap();
        assert!(Roster::from_table(&table).is_err());
    }
}
