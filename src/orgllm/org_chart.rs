//! Org chart and budget ledger.
//!
//! The chart is a forest of agents rooted at founders, held as
//! `supervisor_id → ordered staff ids` with the inverse lookup derived on
//! demand. The ledger tracks each agent's remaining budget, its recursive
//! running cost, and the free-form status string the agent writes about
//! itself. Every mutation here happens under the organization lock via the
//! event dispatcher, so the operations are plain synchronous code.
//!
//! Invariants maintained: a non-founder has exactly one supervisor, an id
//! appears in exactly one staff list, and an agent can only be removed once
//! it has no staff of its own. Budgets are allowed to go negative —
//! bankruptcy is something agents reason about, not an error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt;

/// Errors for chart mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartError {
    /// The staff id is already in some supervisor's list.
    AlreadySupervised(u64),
    /// The agent still has staff and cannot be removed.
    HasStaff(u64),
}

impl fmt::Display for ChartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartError::AlreadySupervised(id) => {
                write!(f, "Agent {} already has a supervisor", id)
            }
            ChartError::HasStaff(id) => write!(
                f,
                "Agent {} cannot be fired because they have employees. Instruct them to let go of their workforce so they can be fired.",
                id
            ),
        }
    }
}

impl Error for ChartError {}

/// The supervisor→staff forest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgChart {
    supervisor_to_staff: BTreeMap<u64, Vec<u64>>,
}

impl OrgChart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a chart from a persisted map (used by load).
    pub fn from_map(supervisor_to_staff: BTreeMap<u64, Vec<u64>>) -> Self {
        Self { supervisor_to_staff }
    }

    /// The raw map, as persisted in the organization snapshot.
    pub fn as_map(&self) -> &BTreeMap<u64, Vec<u64>> {
        &self.supervisor_to_staff
    }

    /// Append `staff_id` to the supervisor's ordered staff list.
    ///
    /// Rejects ids that already have a supervisor, which is what keeps every
    /// agent in at most one staff list.
    pub fn add_staff(&mut self, supervisor_id: u64, staff_id: u64) -> Result<(), ChartError> {
        if self.supervisor_of(staff_id).is_some() {
            return Err(ChartError::AlreadySupervised(staff_id));
        }
        self.supervisor_to_staff
            .entry(supervisor_id)
            .or_insert_with(Vec::new)
            .push(staff_id);
        Ok(())
    }

    /// Remove an agent from the chart.
    ///
    /// Fails while the agent still has staff. Idempotent for ids that are not
    /// in the chart at all (a founder with no staff simply is not present).
    pub fn remove(&mut self, agent_id: u64) -> Result<(), ChartError> {
        if self.has_staff(agent_id) {
            return Err(ChartError::HasStaff(agent_id));
        }
        self.supervisor_to_staff.remove(&agent_id);
        if let Some(supervisor_id) = self.supervisor_of(agent_id) {
            if let Some(staff) = self.supervisor_to_staff.get_mut(&supervisor_id) {
                staff.retain(|&id| id != agent_id);
                if staff.is_empty() {
                    self.supervisor_to_staff.remove(&supervisor_id);
                }
            }
        }
        Ok(())
    }

    /// The supervisor of `agent_id`, if any.
    pub fn supervisor_of(&self, agent_id: u64) -> Option<u64> {
        self.supervisor_to_staff
            .iter()
            .find(|(_, staff)| staff.contains(&agent_id))
            .map(|(&supervisor, _)| supervisor)
    }

    /// The ordered staff list of `agent_id`.
    pub fn staff_of(&self, agent_id: u64) -> &[u64] {
        self.supervisor_to_staff
            .get(&agent_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// True if `supervisor_id` currently supervises `agent_id`.
    pub fn is_supervisor(&self, supervisor_id: u64, agent_id: u64) -> bool {
        self.supervisor_of(agent_id) == Some(supervisor_id)
    }

    /// True if the agent has at least one staff member.
    pub fn has_staff(&self, agent_id: u64) -> bool {
        !self.staff_of(agent_id).is_empty()
    }

    /// Every id mentioned anywhere in the chart.
    pub fn agent_ids(&self) -> Vec<u64> {
        let mut ids = HashSet::new();
        for (&supervisor, staff) in &self.supervisor_to_staff {
            ids.insert(supervisor);
            ids.extend(staff.iter().copied());
        }
        let mut ids: Vec<u64> = ids.into_iter().collect();
        ids.sort_unstable();
        ids
    }

    /// Pre-order walk of a subtree, yielding `(agent_id, depth)`.
    ///
    /// The walk carries a visited set so a corrupt, cyclic chart produces a
    /// truncated listing instead of an endless one.
    pub fn hierarchy(&self, root: u64) -> Vec<(u64, usize)> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            out.push((id, depth));
            for &staff_id in self.staff_of(id).iter().rev() {
                stack.push((staff_id, depth + 1));
            }
        }
        out
    }

    /// Recursive subtree cost at a fixed per-node unit, bounded by node count.
    ///
    /// Returns `None` when the walk touches more than `max_nodes` nodes, which
    /// only happens when the chart is corrupt (a cycle).
    pub fn subtree_cost_bounded(&self, root: u64, unit_cost: i64, max_nodes: usize) -> Option<i64> {
        let mut total = 0i64;
        let mut nodes = 0usize;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            nodes += 1;
            if nodes > max_nodes {
                return None;
            }
            total += unit_cost;
            stack.extend(self.staff_of(id).iter().copied());
        }
        Some(total)
    }

    /// True if walking supervisors from every agent terminates at a founder.
    pub fn is_acyclic(&self) -> bool {
        let ids = self.agent_ids();
        let limit = ids.len() + 1;
        for id in ids {
            let mut current = id;
            let mut hops = 0usize;
            while let Some(supervisor) = self.supervisor_of(current) {
                hops += 1;
                if hops > limit {
                    return false;
                }
                current = supervisor;
            }
        }
        true
    }
}

/// Per-agent budget, running cost, and status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetLedger {
    budgets: BTreeMap<u64, i64>,
    running_costs: BTreeMap<u64, i64>,
    statuses: BTreeMap<u64, String>,
}

impl BudgetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted maps (used by load).
    pub fn from_maps(
        budgets: BTreeMap<u64, i64>,
        running_costs: BTreeMap<u64, i64>,
        statuses: BTreeMap<u64, String>,
    ) -> Self {
        Self {
            budgets,
            running_costs,
            statuses,
        }
    }

    /// Initialize the ledger entries for a newly added agent.
    pub fn init_agent(&mut self, agent_id: u64, budget: i64, unit_cost: i64, status: &str) {
        self.budgets.insert(agent_id, budget);
        self.running_costs.insert(agent_id, unit_cost);
        self.statuses.insert(agent_id, status.to_string());
    }

    /// Delete every entry for an agent. Idempotent.
    pub fn remove_agent(&mut self, agent_id: u64) {
        self.budgets.remove(&agent_id);
        self.running_costs.remove(&agent_id);
        self.statuses.remove(&agent_id);
    }

    /// Subtract `amount` from the agent's budget; the result may go negative.
    pub fn debit(&mut self, agent_id: u64, amount: i64) -> bool {
        match self.budgets.get_mut(&agent_id) {
            Some(budget) => {
                *budget -= amount;
                true
            }
            None => false,
        }
    }

    pub fn set_running_cost(&mut self, agent_id: u64, cost: i64) {
        self.running_costs.insert(agent_id, cost);
    }

    pub fn set_status(&mut self, agent_id: u64, status: &str) {
        self.statuses.insert(agent_id, status.to_string());
    }

    pub fn budget(&self, agent_id: u64) -> Option<i64> {
        self.budgets.get(&agent_id).copied()
    }

    pub fn running_cost(&self, agent_id: u64) -> Option<i64> {
        self.running_costs.get(&agent_id).copied()
    }

    pub fn status(&self, agent_id: u64) -> Option<&str> {
        self.statuses.get(&agent_id).map(String::as_str)
    }

    pub fn budgets(&self) -> &BTreeMap<u64, i64> {
        &self.budgets
    }

    pub fn running_costs(&self) -> &BTreeMap<u64, i64> {
        &self.running_costs
    }

    pub fn statuses(&self) -> &BTreeMap<u64, String> {
        &self.statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_level_chart() -> OrgChart {
        // 1 supervises 2 and 3; 2 supervises 4.
        let mut chart = OrgChart::new();
        chart.add_staff(1, 2).unwrap();
        chart.add_staff(1, 3).unwrap();
        chart.add_staff(2, 4).unwrap();
        chart
    }

    #[test]
    fn each_agent_has_one_supervisor() {
        let mut chart = three_level_chart();
        assert_eq!(chart.supervisor_of(2), Some(1));
        assert_eq!(chart.supervisor_of(4), Some(2));
        assert_eq!(chart.supervisor_of(1), None);
        assert_eq!(
            chart.add_staff(3, 4),
            Err(ChartError::AlreadySupervised(4))
        );
    }

    #[test]
    fn remove_refuses_managers() {
        let mut chart = three_level_chart();
        assert_eq!(chart.remove(2), Err(ChartError::HasStaff(2)));
        chart.remove(4).unwrap();
        chart.remove(2).unwrap();
        assert_eq!(chart.staff_of(1), &[3]);
        // removing an unknown id is a no-op
        chart.remove(99).unwrap();
    }

    #[test]
    fn empty_staff_lists_are_pruned() {
        let mut chart = OrgChart::new();
        chart.add_staff(1, 2).unwrap();
        chart.remove(2).unwrap();
        assert!(chart.as_map().is_empty());
    }

    #[test]
    fn subtree_cost_matches_node_count() {
        let chart = three_level_chart();
        assert_eq!(chart.subtree_cost_bounded(1, 100, 10), Some(400));
        assert_eq!(chart.subtree_cost_bounded(2, 100, 10), Some(200));
        assert_eq!(chart.subtree_cost_bounded(3, 100, 10), Some(100));
    }

    #[test]
    fn cycle_is_detected_by_node_budget() {
        let mut map = BTreeMap::new();
        map.insert(2u64, vec![3u64]);
        map.insert(3u64, vec![2u64]);
        let chart = OrgChart::from_map(map);
        assert_eq!(chart.subtree_cost_bounded(2, 100, 8), None);
        assert!(!chart.is_acyclic());
    }

    #[test]
    fn hierarchy_is_preorder_and_cycle_safe() {
        let chart = three_level_chart();
        let walk = chart.hierarchy(1);
        assert_eq!(walk, vec![(1, 0), (2, 1), (4, 2), (3, 1)]);

        let mut map = BTreeMap::new();
        map.insert(2u64, vec![3u64]);
        map.insert(3u64, vec![2u64]);
        let cyclic = OrgChart::from_map(map);
        assert_eq!(cyclic.hierarchy(2).len(), 2);
    }

    #[test]
    fn ledger_lifecycle_and_negative_budgets() {
        let mut ledger = BudgetLedger::new();
        ledger.init_agent(2, 50, 100, "hired");
        assert_eq!(ledger.budget(2), Some(50));
        assert_eq!(ledger.running_cost(2), Some(100));

        assert!(ledger.debit(2, 100));
        assert!(ledger.debit(2, 100));
        assert_eq!(ledger.budget(2), Some(-150));

        assert!(!ledger.debit(9, 100));

        ledger.remove_agent(2);
        assert_eq!(ledger.budget(2), None);
        assert_eq!(ledger.status(2), None);
    }
}
