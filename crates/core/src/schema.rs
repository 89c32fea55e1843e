use std::collections::HashMap;

use crate::error::CoreError;
use crate::fields::{SLOT_PAIRS, SkillField, FieldKind};

/// Ordered column names of a table, with case-insensitive lookup.
///
/// Blank header cells are kept positionally but are never resolvable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    columns: Vec<String>,
    folded: HashMap<String, usize>,
}

impl Header {
    pub fn new(columns: Vec<String>) -> Result<Self, CoreError> {
        let mut folded = HashMap::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if column.trim().is_empty() {
                continue;
            }
            if folded.insert(column.to_lowercase(), index).is_some() {
                return Err(CoreError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self { columns, folded })
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.folded.get(&name.to_lowercase()).copied()
    }

    pub fn require(&self, name: &str) -> Result<usize, CoreError> {
        self.index_of(name)
            .ok_or_else(|| CoreError::ColumnNotFound(name.to_string()))
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Header positions of one profession/level pair. Either side may be
/// missing from a given sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSlot {
    pub slot: u8,
    pub profession: Option<usize>,
    pub level: Option<usize>,
}

/// The slot association table bound to a concrete header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotColumns {
    slots: Vec<ResolvedSlot>,
}

impl SlotColumns {
    pub fn resolve(header: &Header) -> Self {
        let slots = SLOT_PAIRS
            .iter()
            .map(|pair| ResolvedSlot {
                slot: pair.slot,
                profession: header.index_of(pair.profession),
                level: header.index_of(pair.level),
            })
            .collect();
        Self { slots }
    }

    pub fn index_of(&self, field: SkillField) -> Option<usize> {
        let slot = self.slots.iter().find(|s| s.slot == field.slot())?;
        match field.kind() {
            FieldKind::Profession => slot.profession,
            FieldKind::Level => slot.level,
        }
    }

    /// Every profession column present in the header, in slot order.
    pub fn profession_columns(&self) -> Vec<usize> {
        self.slots.iter().filter_map(|s| s.profession).collect()
    }

    /// The `level_N` column paired with the profession column at `column`.
    pub fn companion_level(&self, column: usize) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.profession == Some(column))
            .and_then(|s| s.level)
    }
}

/// Column positions the reconciliation engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberColumns {
    pub name: usize,
    pub discord_id: usize,
    pub display_name: usize,
    pub last_update: usize,
    pub slots: SlotColumns,
}

impl MemberColumns {
    pub const NAME: &'static str = "name";
    pub const DISCORD_ID: &'static str = "discord_id";
    pub const DISPLAY_NAME: &'static str = "display_name";
    pub const LAST_UPDATE: &'static str = "last_update";

    /// Header written to a sheet that has none yet.
    pub fn default_header() -> Vec<String> {
        [Self::NAME, Self::DISCORD_ID, Self::DISPLAY_NAME, Self::LAST_UPDATE]
            .into_iter()
            .chain(SLOT_PAIRS.iter().flat_map(|pair| [pair.profession, pair.level]))
            .map(str::to_string)
            .collect()
    }

    pub fn resolve(header: &Header) -> Result<Self, CoreError> {
        Ok(Self {
            name: header.require(Self::NAME)?,
            discord_id: header.require(Self::DISCORD_ID)?,
            display_name: header.require(Self::DISPLAY_NAME)?,
            last_update: header.require(Self::LAST_UPDATE)?,
            slots: SlotColumns::resolve(header),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Header {
        Header::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let h = header(&["Name", "Discord_ID", "display_name"]);
        assert_eq!(h.index_of("name"), Some(0));
        assert_eq!(h.index_of("DISCORD_id"), Some(1));
        assert_eq!(h.index_of("display_name"), Some(2));
        assert_eq!(h.index_of("last_update"), None);
        assert_eq!(h.name_at(1), Some("Discord_ID"));
        assert_eq!(h.name_at(9), None);
    }

    #[test]
    fn duplicate_after_folding_is_rejected() {
        let err = Header::new(vec!["name".into(), "NAME".into()]).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateColumn(ref c) if c == "NAME"));
        assert!(err.is_schema_error());
    }

    #[test]
    fn blank_cells_are_not_resolvable() {
        let h = header(&["name", "", " ", "level_1"]);
        assert_eq!(h.len(), 4);
        assert_eq!(h.index_of(""), None);
        assert_eq!(h.index_of("level_1"), Some(3));
    }

    #[test]
    fn require_reports_missing_column() {
        let h = header(&["name", "discord_id", "display_name"]);
        let err = MemberColumns::resolve(&h).unwrap_err();
        assert!(matches!(err, CoreError::ColumnNotFound(ref c) if c == "last_update"));
    }

    #[test]
    fn default_header_resolves_every_slot() {
        let h = Header::new(MemberColumns::default_header()).unwrap();
        assert_eq!(h.len(), 14);
        let cols = MemberColumns::resolve(&h).unwrap();
        assert_eq!(cols.name, 0);
        assert_eq!(cols.slots.profession_columns(), vec![4, 6, 8, 10, 12]);
        assert_eq!(cols.slots.companion_level(12), Some(13));
    }

    #[test]
    fn slots_pair_by_declaration_not_position() {
        let h = header(&[
            "name", "level_2", "profession_1", "discord_id", "profession_2",
            "display_name", "last_update", "level_1",
        ]);
        let cols = MemberColumns::resolve(&h).unwrap();
        assert_eq!(cols.slots.profession_columns(), vec![2, 4]);
        assert_eq!(cols.slots.companion_level(2), Some(7));
        assert_eq!(cols.slots.companion_level(4), Some(1));
        assert_eq!(cols.slots.companion_level(0), None);
        assert_eq!(cols.slots.index_of(SkillField::level(3).unwrap()), None);
    }
}
