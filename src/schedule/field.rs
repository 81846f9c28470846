use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::slot_utils::{hm, slots_in_window};
use super::types::WIDE_FORMAT;
use crate::error::SearchError;

/// Maximum number of slots a single field may offer
pub const MAX_FIELD_SLOTS: i64 = 40;

/// Field description as submitted with a search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub format: u8,
    #[serde(with = "hm")]
    pub from: NaiveTime,
    #[serde(with = "hm")]
    pub to: NaiveTime,
    /// Game duration in minutes
    pub dur: u32,
}

/// A physical playing field with its working window split into equal slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub id: u32,
    pub format: u8,
    pub duration_minutes: u32,
    #[serde(with = "hm")]
    pub from: NaiveTime,
    #[serde(with = "hm")]
    pub to: NaiveTime,
    slots_count: usize,
}

impl Field {
    pub fn new(id: u32, spec: &FieldSpec) -> Result<Self, SearchError> {
        if spec.dur == 0 {
            return Err(SearchError::InvalidFieldDuration { field: id });
        }
        let slots = slots_in_window(spec.from, spec.to, spec.dur);
        if !(1..=MAX_FIELD_SLOTS).contains(&slots) {
            return Err(SearchError::InvalidField { field: id, slots });
        }

        Ok(Self {
            id,
            format: spec.format,
            duration_minutes: spec.dur,
            from: spec.from,
            to: spec.to,
            slots_count: slots as usize,
        })
    }

    pub fn slots_count(&self) -> usize {
        self.slots_count
    }

    pub fn slots(&self) -> std::ops::Range<usize> {
        0..self.slots_count
    }
}

/// Placement target: one field, or two fields combined for wide-format games
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    /// Indices into the condition's field list
    members: Vec<usize>,
    format: u8,
    slots_count: usize,
    from: NaiveTime,
    to: NaiveTime,
    label: String,
}

impl FieldNode {
    pub fn single(index: usize, field: &Field) -> Self {
        Self {
            members: vec![index],
            format: field.format,
            slots_count: field.slots_count(),
            from: field.from,
            to: field.to,
            label: format!("[field{}]", field.id),
        }
    }

    pub fn paired(first: (usize, &Field), second: (usize, &Field)) -> Self {
        let (i1, f1) = first;
        let (i2, f2) = second;
        Self {
            members: vec![i1, i2],
            format: WIDE_FORMAT,
            slots_count: f1.slots_count().min(f2.slots_count()),
            from: f1.from.min(f2.from),
            to: f1.to.max(f2.to),
            label: format!("[field{},field{}]", f1.id, f2.id),
        }
    }

    /// Effective format: 7 for a pair, else the field's own
    pub fn format(&self) -> u8 {
        self.format
    }

    pub fn is_paired(&self) -> bool {
        self.members.len() > 1
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn is_slot_ok(&self, slot: usize) -> bool {
        slot < self.slots_count
    }

    /// Widest window covered by the member fields
    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        (self.from, self.to)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Interchangeability key: nodes with the same key offer identical openings
    pub fn key(&self) -> (u8, NaiveTime, NaiveTime) {
        (self.format, self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(format: u8, from: (u32, u32), to: (u32, u32), dur: u32) -> FieldSpec {
        FieldSpec {
            format,
            from: NaiveTime::from_hms_opt(from.0, from.1, 0).unwrap(),
            to: NaiveTime::from_hms_opt(to.0, to.1, 0).unwrap(),
            dur,
        }
    }

    #[test]
    fn slot_count_is_floored() {
        let field = Field::new(1, &spec(5, (9, 0), (12, 10), 30)).unwrap();
        assert_eq!(field.slots_count(), 6);
        assert_eq!(field.slots().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_empty_and_oversized_windows() {
        assert!(matches!(
            Field::new(1, &spec(5, (9, 0), (9, 20), 30)),
            Err(SearchError::InvalidField { slots: 0, .. })
        ));
        assert!(matches!(
            Field::new(2, &spec(5, (0, 0), (23, 0), 15)),
            Err(SearchError::InvalidField { slots: 92, .. })
        ));
        assert!(matches!(
            Field::new(3, &spec(5, (9, 0), (10, 0), 0)),
            Err(SearchError::InvalidFieldDuration { field: 3 })
        ));
    }

    #[test]
    fn paired_node_uses_shortest_slot_range() {
        let f1 = Field::new(1, &spec(5, (9, 0), (12, 0), 30)).unwrap();
        let f2 = Field::new(2, &spec(5, (9, 0), (11, 0), 30)).unwrap();
        let node = FieldNode::paired((0, &f1), (1, &f2));

        assert_eq!(node.format(), WIDE_FORMAT);
        assert!(node.is_paired());
        assert!(node.is_slot_ok(3));
        assert!(!node.is_slot_ok(4));
        assert_eq!(node.label(), "[field1,field2]");
        assert_eq!(node.window().1, f1.to);
    }

    #[test]
    fn single_node_mirrors_field() {
        let f = Field::new(4, &spec(3, (10, 0), (11, 0), 20)).unwrap();
        let node = FieldNode::single(3, &f);
        assert_eq!(node.format(), 3);
        assert_eq!(node.members(), &[3]);
        assert!(node.is_slot_ok(2));
        assert!(!node.is_slot_ok(3));
        assert_eq!(node.label(), "[field4]");
    }
}
