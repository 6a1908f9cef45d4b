//! Positional reconciliation of externally polled lists.
//!
//! The game-state service resends whole lists on every poll. Merging them by
//! position keeps the index of every untouched entry stable (other state such
//! as the selected location index depends on it) and only produces list
//! operations for entries that actually differ.

use serde::{Deserialize, Serialize};

use crate::model::{CommEvent, Location, MissionData, TaskData};

/// Per-entity-type equivalence used to decide whether an overwrite is needed.
///
/// Implementations choose which fields matter; a field left out of the
/// comparison never triggers replication on its own.
pub trait Equivalent {
    fn is_equivalent(&self, other: &Self) -> bool;
}

impl Equivalent for Location {
    fn is_equivalent(&self, other: &Self) -> bool {
        self.location_id == other.location_id
            && self.name == other.name
            && self.targets() == other.targets()
            && self.backdrop_id == other.backdrop_id
    }
}

impl Equivalent for TaskData {
    fn is_equivalent(&self, other: &Self) -> bool {
        self.task_id == other.task_id
            && self.description == other.description
            && self.complete == other.complete
            && self.video_present == other.video_present
            && self.info_present == other.info_present
            && self.info_text == other.info_text
    }
}

impl Equivalent for MissionData {
    fn is_equivalent(&self, other: &Self) -> bool {
        self.mission_id == other.mission_id
            && self.title == other.title
            && self.summary_short == other.summary_short
            && self.summary_long == other.summary_long
            && self.complete == other.complete
            && self.points == other.points
            && self.tasks.len() == other.tasks.len()
            && self
                .tasks
                .iter()
                .zip(&other.tasks)
                .all(|(a, b)| a.is_equivalent(b))
    }
}

// Two events with the same id and video are the same transmission, even if
// the service reshuffles the template.
impl Equivalent for CommEvent {
    fn is_equivalent(&self, other: &Self) -> bool {
        self.event_id == other.event_id && self.video_url == other.video_url
    }
}

impl<T: Equivalent> Equivalent for Option<T> {
    fn is_equivalent(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.is_equivalent(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// A single mutation of an index-addressed replicated list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ListOp<T> {
    Push(T),
    Set { index: usize, item: T },
    Truncate { len: usize },
}

/// Merges `incoming` into `existing` by position and returns the operations
/// applied, in order.
///
/// Entries at the same index that are equivalent are left untouched. Excess
/// trailing entries are removed in one pass; interior entries are never
/// reordered.
pub fn merge_indexed<T, F>(existing: &mut Vec<T>, incoming: &[T], equivalent: F) -> Vec<ListOp<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let mut ops = Vec::new();

    for (index, item) in incoming.iter().enumerate() {
        if index == existing.len() {
            existing.push(item.clone());
            ops.push(ListOp::Push(item.clone()));
        } else if !equivalent(&existing[index], item) {
            existing[index] = item.clone();
            ops.push(ListOp::Set {
                index,
                item: item.clone(),
            });
        }
    }

    if existing.len() > incoming.len() {
        existing.truncate(incoming.len());
        ops.push(ListOp::Truncate {
            len: incoming.len(),
        });
    }

    ops
}

/// Replays one operation on an observer's copy of a list.
///
/// Returns false if the operation does not fit the local list, which means
/// the observer missed an earlier operation and needs a fresh snapshot.
pub fn apply_list_op<T>(list: &mut Vec<T>, op: ListOp<T>) -> bool {
    match op {
        ListOp::Push(item) => {
            list.push(item);
            true
        }
        ListOp::Set { index, item } => match list.get_mut(index) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        },
        ListOp::Truncate { len } => {
            if len > list.len() {
                return false;
            }
            list.truncate(len);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrajectoryTargets;

    fn location(id: &str, launch: i32) -> Location {
        Location::new(
            id,
            id,
            TrajectoryTargets {
                launch,
                correction: 0,
                cube: 0,
            },
        )
    }

    #[test]
    fn test_merge_only_touches_changed_index() {
        let mut existing = vec![location("a", 1), location("b", 2), location("c", 3)];
        let incoming = vec![location("a", 1), location("b", 2), location("d", 4)];

        let ops = merge_indexed(&mut existing, &incoming, Location::is_equivalent);

        assert_eq!(
            ops,
            vec![ListOp::Set {
                index: 2,
                item: location("d", 4)
            }]
        );
        assert_eq!(existing, incoming);
    }

    #[test]
    fn test_merge_truncates_trailing_entries() {
        let mut existing = vec![
            location("a", 1),
            location("b", 2),
            location("c", 3),
            location("d", 4),
        ];
        let incoming = vec![location("a", 1), location("b", 2)];

        let ops = merge_indexed(&mut existing, &incoming, Location::is_equivalent);

        assert_eq!(ops, vec![ListOp::Truncate { len: 2 }]);
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[1].location_id, "b");
    }

    #[test]
    fn test_merge_appends_new_entries() {
        let mut existing = vec![location("a", 1)];
        let incoming = vec![location("a", 1), location("b", 2)];

        let ops = merge_indexed(&mut existing, &incoming, Location::is_equivalent);

        assert_eq!(ops, vec![ListOp::Push(location("b", 2))]);
    }

    #[test]
    fn test_merge_identical_lists_is_silent() {
        let mut existing = vec![location("a", 1), location("b", 2)];
        let incoming = existing.clone();

        assert!(merge_indexed(&mut existing, &incoming, Location::is_equivalent).is_empty());
    }

    #[test]
    fn test_merge_with_custom_equivalence() {
        // Only identity counts: a renamed entry with the same id is left alone.
        let mut existing = vec![location("a", 1)];
        let incoming = vec![location("a", 99)];

        let ops = merge_indexed(&mut existing, &incoming, |a: &Location, b: &Location| {
            a.location_id == b.location_id
        });

        assert!(ops.is_empty());
        assert_eq!(existing[0].trajectory_launch, 1);
    }

    #[test]
    fn test_mission_equivalence_looks_at_tasks() {
        let mut first = MissionData {
            mission_id: "m1".into(),
            tasks: vec![TaskData {
                task_id: "t1".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let second = first.clone();
        assert!(first.is_equivalent(&second));

        first.tasks[0].complete = true;
        assert!(!first.is_equivalent(&second));
    }

    #[test]
    fn test_comm_event_equivalence_ignores_template() {
        let a = CommEvent {
            event_id: "e1".into(),
            template: crate::model::TemplateKind::Probe,
            video_url: "v1".into(),
        };
        let mut b = a.clone();
        b.template = crate::model::TemplateKind::Incoming;
        assert!(a.is_equivalent(&b));
        assert!(Some(a.clone()).is_equivalent(&Some(b)));
        assert!(!Some(a).is_equivalent(&None));
    }

    #[test]
    fn test_replaying_ops_reproduces_host_list() {
        let mut host = vec![location("a", 1), location("b", 2), location("c", 3)];
        let mut observer = host.clone();
        let incoming = vec![location("a", 1), location("x", 7)];

        for op in merge_indexed(&mut host, &incoming, Location::is_equivalent) {
            assert!(apply_list_op(&mut observer, op));
        }
        assert_eq!(observer, host);
    }

    #[test]
    fn test_apply_rejects_out_of_range_set() {
        let mut observer: Vec<Location> = Vec::new();
        let op = ListOp::Set {
            index: 3,
            item: location("a", 1),
        };
        assert!(!apply_list_op(&mut observer, op));
        assert!(!apply_list_op(&mut observer, ListOp::Truncate { len: 1 }));
    }
}
