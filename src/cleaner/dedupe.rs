use std::cmp::Reverse;
use std::collections::HashMap;

use serde::Serialize;

use super::classify::NormalizedRow;
use crate::model::Value;

/// Rows sharing one duplicate key. `members` is sorted and always contains `survivor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub members: Vec<usize>,
    pub survivor: usize,
}

impl DuplicateGroup {
    fn singleton(index: usize) -> Self {
        DuplicateGroup {
            members: vec![index],
            survivor: index,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.members.len() > 1
    }

    pub fn removed(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().copied().filter(|&i| i != self.survivor)
    }
}

/// Group rows by the normalized values of `key_columns`.
///
/// A row with a null (or absent) key cell always forms its own group. An
/// empty key list groups nothing. Groups come back ordered by their first
/// member.
pub fn resolve(rows: &[NormalizedRow], key_columns: &[String]) -> Vec<DuplicateGroup> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_key: HashMap<Vec<&Value>, usize> = HashMap::new();

    for (pos, row) in rows.iter().enumerate() {
        match duplicate_key(row, key_columns) {
            Some(key) => match by_key.get(&key) {
                Some(&g) => groups[g].push(pos),
                None => {
                    by_key.insert(key, groups.len());
                    groups.push(vec![pos]);
                }
            },
            None => groups.push(vec![pos]),
        }
    }

    groups
        .into_iter()
        .map(|positions| {
            if positions.len() == 1 {
                return DuplicateGroup::singleton(rows[positions[0]].index);
            }
            let survivor = pick_survivor(rows, &positions);
            let mut members: Vec<usize> = positions.iter().map(|&p| rows[p].index).collect();
            members.sort_unstable();
            DuplicateGroup { members, survivor }
        })
        .collect()
}

fn duplicate_key<'a>(row: &'a NormalizedRow, key_columns: &[String]) -> Option<Vec<&'a Value>> {
    if key_columns.is_empty() {
        return None;
    }
    key_columns
        .iter()
        .map(|c| row.get(c).filter(|v| !v.is_null()))
        .collect()
}

/// Fewest issues, then most filled cells, then lowest original index.
fn pick_survivor(rows: &[NormalizedRow], positions: &[usize]) -> usize {
    positions
        .iter()
        .map(|&p| &rows[p])
        .min_by_key(|r| (r.issues.len(), Reverse(r.filled_count()), r.index))
        .map(|r| r.index)
        .unwrap_or_default()
}
