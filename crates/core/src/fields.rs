use std::collections::BTreeMap;
use std::fmt;

pub const SLOT_COUNT: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    Profession,
    Level,
}

/// One numbered (profession, level) column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPair {
    pub slot: u8,
    pub profession: &'static str,
    pub level: &'static str,
}

/// Declared association between `profession_N` and its companion `level_N`.
pub const SLOT_PAIRS: [SlotPair; SLOT_COUNT as usize] = [
    SlotPair { slot: 1, profession: "profession_1", level: "level_1" },
    SlotPair { slot: 2, profession: "profession_2", level: "level_2" },
    SlotPair { slot: 3, profession: "profession_3", level: "level_3" },
    SlotPair { slot: 4, profession: "profession_4", level: "level_4" },
    SlotPair { slot: 5, profession: "profession_5", level: "level_5" },
];

/// One of the ten user-editable skill fields.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkillField {
    slot: u8,
    kind: FieldKind,
}

impl SkillField {
    pub fn profession(slot: u8) -> Option<Self> {
        Self::new(slot, FieldKind::Profession)
    }

    pub fn level(slot: u8) -> Option<Self> {
        Self::new(slot, FieldKind::Level)
    }

    fn new(slot: u8, kind: FieldKind) -> Option<Self> {
        (1..=SLOT_COUNT).contains(&slot).then_some(Self { slot, kind })
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        SLOT_PAIRS.iter().find_map(|pair| {
            if pair.profession == name {
                Self::profession(pair.slot)
            } else if pair.level == name {
                Self::level(pair.slot)
            } else {
                None
            }
        })
    }

    /// All ten fields: profession_1, level_1, profession_2, ...
    pub fn all() -> impl Iterator<Item = SkillField> {
        SLOT_PAIRS.iter().flat_map(|pair| {
            [
                SkillField { slot: pair.slot, kind: FieldKind::Profession },
                SkillField { slot: pair.slot, kind: FieldKind::Level },
            ]
        })
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn column_name(&self) -> &'static str {
        let pair = &SLOT_PAIRS[usize::from(self.slot - 1)];
        match self.kind {
            FieldKind::Profession => pair.profession,
            FieldKind::Level => pair.level,
        }
    }
}

impl fmt::Debug for SkillField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl fmt::Display for SkillField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Requested field values, already normalized. Absent fields stay untouched.
pub type FieldUpdates = BTreeMap<SkillField, String>;
