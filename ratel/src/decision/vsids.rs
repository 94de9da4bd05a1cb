//! The VSIDS branching heuristic.
//!
//! The VSIDS (Variable State Independent Decaying Sum) branching heuristic keeps an activity value
//! for each variable. For each conflict some variables are bumped, which means that their activity
//! is increased by a constant. After bumping some variables, the activity of all variables is
//! decayed by multiplying it with a constant below 1.
//!
//! When a decision is made, it branches on the variable with the highest activity among the
//! unassigned variables that are allowed to be decided.

use ordered_float::OrderedFloat;

use ratel_formula::Var;

use crate::config::SolverConfig;

/// Rescale activities if any value exceeds this value.
const RESCALE_LIMIT: f64 = 1e100;

/// The VSIDS branching heuristic.
///
/// As an optimization instead of decaying all activities each conflict, the bump value is divided
/// by the decay factor each conflict. When this would cause a value to overflow all activities and
/// the bump value are scaled down. Apart from a scaling factor that is the same for all involved
/// values, this is equivalent to the naive implementation. As we only care about the order of
/// activities we can ignore the scaling factor.
///
/// The heap uses lazy deletion: extracting may yield variables that are already assigned, which
/// the caller discards. Variables re-enter the heap when they are unassigned.
pub struct Vsids {
    /// The activity of each variable.
    activity: Vec<OrderedFloat<f64>>,
    /// A binary heap of the variables.
    heap: Vec<Var>,
    /// The position in the binary heap for each variable.
    position: Vec<Option<usize>>,
    /// Whether the variable may be picked as a decision.
    decide: Vec<bool>,
    /// The value to add on bumping.
    bump: f64,
    /// The inverse of the decay factor.
    inv_decay: f64,
}

impl Default for Vsids {
    fn default() -> Vsids {
        Vsids {
            activity: vec![],
            heap: vec![],
            position: vec![],
            decide: vec![],
            bump: 1.0,
            inv_decay: 1.0 / SolverConfig::default().var_activity_decay,
        }
    }
}

impl Vsids {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.activity.len();
        debug_assert!(!self.heap.iter().any(|&v| v.index() > count));

        self.activity.resize(count + 1, OrderedFloat(0.0));
        self.position.resize(count + 1, None);
        self.decide.resize(count + 1, true);
        if old_count == 0 {
            // the reserved variable 0 is never decided
            self.decide[0] = false;
        }

        for index in old_count.max(1)..count + 1 {
            self.make_available(Var::from_index(index));
        }
    }

    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f64) {
        assert!(decay < 1.0);
        assert!(decay > 1.0 / 16.0);
        self.inv_decay = 1.0 / decay;
    }

    /// The activity of a variable.
    pub fn activity(&self, var: Var) -> f64 {
        self.activity[var.index()].0
    }

    /// Whether a variable may be picked as a decision.
    pub fn is_decidable(&self, var: Var) -> bool {
        self.decide[var.index()]
    }

    /// Allow or forbid decisions on a variable.
    ///
    /// A forbidden variable already in the heap is discarded lazily on extraction.
    pub fn set_decidable(&mut self, var: Var, decidable: bool) {
        self.decide[var.index()] = decidable;
    }

    /// Bump a variable by increasing its activity.
    pub fn bump(&mut self, var: Var) {
        let rescale = {
            let value = &mut self.activity[var.index()];
            value.0 += self.bump;
            value.0 >= RESCALE_LIMIT
        };
        if rescale {
            self.rescale();
        }
        if let Some(pos) = self.position[var.index()] {
            self.sift_up(pos);
        }
    }

    /// Decay all variable activities.
    pub fn decay(&mut self) {
        self.bump *= self.inv_decay;
        if self.bump >= RESCALE_LIMIT {
            self.rescale();
        }
    }

    /// Rescale all values to avoid an overflow.
    fn rescale(&mut self) {
        let rescale_factor = 1.0 / RESCALE_LIMIT;
        for activity in &mut self.activity {
            activity.0 *= rescale_factor;
        }
        self.bump *= rescale_factor;
    }

    /// Insert a variable into the heap if not already present.
    ///
    /// Variables that are not allowed to be decided stay out of the heap.
    pub fn make_available(&mut self, var: Var) {
        if self.decide[var.index()] && self.position[var.index()].is_none() {
            let position = self.heap.len();
            self.position[var.index()] = Some(position);
            self.heap.push(var);
            self.sift_up(position);
        }
    }

    /// The most active variable in the heap, without removing it.
    pub fn peek(&self) -> Option<Var> {
        self.heap.first().cloned()
    }

    /// Whether the variable is currently in the heap.
    pub fn in_heap(&self, var: Var) -> bool {
        self.position[var.index()].is_some()
    }

    /// Move a variable closer to the root until the heap property is satisfied.
    fn sift_up(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            if pos == 0 {
                return;
            }
            let parent_pos = (pos - 1) / 2;
            let parent_var = self.heap[parent_pos];
            if self.activity[parent_var.index()] >= self.activity[var.index()] {
                return;
            }
            self.position[var.index()] = Some(parent_pos);
            self.heap[parent_pos] = var;
            self.position[parent_var.index()] = Some(pos);
            self.heap[pos] = parent_var;
            pos = parent_pos;
        }
    }

    /// Move a variable away from the root until the heap property is satisfied.
    fn sift_down(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            let mut largest_pos = pos;
            let mut largest_var = var;

            let left_pos = pos * 2 + 1;
            if left_pos < self.heap.len() {
                let left_var = self.heap[left_pos];

                if self.activity[largest_var.index()] < self.activity[left_var.index()] {
                    largest_pos = left_pos;
                    largest_var = left_var;
                }
            }

            let right_pos = pos * 2 + 2;
            if right_pos < self.heap.len() {
                let right_var = self.heap[right_pos];

                if self.activity[largest_var.index()] < self.activity[right_var.index()] {
                    largest_pos = right_pos;
                    largest_var = right_var;
                }
            }

            if largest_pos == pos {
                return;
            }

            self.position[var.index()] = Some(largest_pos);
            self.heap[largest_pos] = var;
            self.position[largest_var.index()] = Some(pos);
            self.heap[pos] = largest_var;
            pos = largest_pos;
        }
    }
}

impl Iterator for Vsids {
    type Item = Var;

    fn next(&mut self) -> Option<Var> {
        if self.heap.is_empty() {
            None
        } else {
            let var = self.heap.swap_remove(0);
            if !self.heap.is_empty() {
                let top_var = self.heap[0];
                self.position[top_var.index()] = Some(0);
                self.sift_down(0);
            }
            self.position[var.index()] = None;
            Some(var)
        }
    }
}
