//! Well-known tag types reserved at bootstrap with fixed IDs.

use crate::ids::TagTypeId;

/// One entry of the predefined tag-type table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredefinedTagType {
    pub name: &'static str,
    pub id: TagTypeId,
    pub multi_valued: bool,
}

/// Process-wide predefined tag types. `label` is the only multi-valued type.
pub static PREDEFINED_TAG_TYPES: &[PredefinedTagType] = &[
    PredefinedTagType {
        name: "label",
        id: TagTypeId(0),
        multi_valued: true,
    },
    PredefinedTagType {
        name: "application",
        id: TagTypeId(1),
        multi_valued: false,
    },
    PredefinedTagType {
        name: "tier",
        id: TagTypeId(2),
        multi_valued: false,
    },
    PredefinedTagType {
        name: "deployment",
        id: TagTypeId(3),
        multi_valued: false,
    },
    PredefinedTagType {
        name: "site",
        id: TagTypeId(4),
        multi_valued: false,
    },
    PredefinedTagType {
        name: "neutron_fwaas",
        id: TagTypeId(5),
        multi_valued: false,
    },
];

/// Look up a predefined tag type by (lower-cased) name
pub fn predefined(name: &str) -> Option<&'static PredefinedTagType> {
    PREDEFINED_TAG_TYPES.iter().find(|t| t.name == name)
}

pub fn is_predefined(name: &str) -> bool {
    predefined(name).is_some()
}

pub fn is_multi_valued(name: &str) -> bool {
    predefined(name).is_some_and(|t| t.multi_valued)
}
