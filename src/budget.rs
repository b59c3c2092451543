//! Allocation of the usable page height across sections.

use log::{debug, warn};

use crate::error::LayoutError;

/// Tolerance when comparing sums of heights, in millimetres.
const EPS: f64 = 1e-6;

/// One item competing for vertical space.
#[derive(Clone, Debug, PartialEq)]
pub struct BudgetItem {
    /// Name used in log messages.
    pub label: String,
    /// Height below which the item cannot be drawn.
    pub min: f64,
    /// Height the item would like to have.
    pub target: f64,
}

impl BudgetItem {
    /// Creates an item; a target below the minimum is raised to the minimum.
    pub fn new(label: impl Into<String>, min: f64, target: f64) -> Self {
        let min = min.max(0.0);
        Self {
            label: label.into(),
            min,
            target: target.max(min),
        }
    }

    /// Creates an item whose height cannot change.
    pub fn fixed(label: impl Into<String>, height: f64) -> Self {
        Self::new(label, height, height)
    }

    fn slack(&self) -> f64 {
        self.target - self.min
    }
}

/// Result of [`HeightBudgetSolver::allocate`].
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
    /// Allotted height per item, in input order.
    pub heights: Vec<f64>,
    /// Share of each item's slack that was kept (1.0 when every target fits).
    pub ratio: f64,
}

impl Allocation {
    /// Sum of all allotted heights.
    pub fn total(&self) -> f64 {
        self.heights.iter().sum()
    }

    /// Returns `true` when at least one item got less than its target.
    pub fn is_compressed(&self) -> bool {
        self.ratio < 1.0
    }
}

/// Distributes a fixed height across items with a minimum and a target each.
///
/// When all targets fit they are used as-is. Otherwise every item's slack
/// (`target - min`) is scaled by the same ratio so the heights sum exactly to the available
/// height. When even the minimums do not fit, the allocation fails before anything is drawn.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeightBudgetSolver;

impl HeightBudgetSolver {
    /// Creates a solver.
    pub fn new() -> Self {
        Self
    }

    /// Allocates `available` millimetres across `items`.
    pub fn allocate(&self, items: &[BudgetItem], available: f64) -> Result<Allocation, LayoutError> {
        let required: f64 = items.iter().map(|item| item.min).sum();
        if required > available + EPS {
            warn!(
                "Layout infeasible: minimum heights need {:.1}mm, {:.1}mm available",
                required, available
            );
            return Err(LayoutError::Infeasible {
                required,
                available,
            });
        }

        let wanted: f64 = items.iter().map(|item| item.target).sum();
        if wanted <= available + EPS {
            return Ok(Allocation {
                heights: items.iter().map(|item| item.target).collect(),
                ratio: 1.0,
            });
        }

        let slack = wanted - required;
        let ratio = ((available - required) / slack).clamp(0.0, 1.0);
        debug!(
            "Compressing {} items from {:.1}mm to {:.1}mm (ratio {:.3})",
            items.len(),
            wanted,
            available,
            ratio
        );
        for item in items.iter().filter(|item| item.slack() > EPS) {
            debug!(
                "  '{}' gets {:.1}mm of its {:.1}mm target",
                item.label,
                item.min + item.slack() * ratio,
                item.target
            );
        }

        Ok(Allocation {
            heights: items
                .iter()
                .map(|item| item.min + item.slack() * ratio)
                .collect(),
            ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_used_when_they_fit() {
        let items = [
            BudgetItem::new("a", 10.0, 20.0),
            BudgetItem::new("b", 5.0, 30.0),
        ];
        let allocation = HeightBudgetSolver::new().allocate(&items, 100.0).unwrap();
        assert_eq!(allocation.heights, vec![20.0, 30.0]);
        assert!(!allocation.is_compressed());
    }

    #[test]
    fn slack_is_scaled_uniformly() {
        let items = [
            BudgetItem::new("a", 10.0, 30.0),
            BudgetItem::fixed("gap", 5.0),
            BudgetItem::new("b", 10.0, 50.0),
        ];
        // Minimums 25, slack 60, available 55 -> ratio 0.5.
        let allocation = HeightBudgetSolver::new().allocate(&items, 55.0).unwrap();
        assert!((allocation.ratio - 0.5).abs() < 1e-9);
        assert_eq!(allocation.heights, vec![20.0, 5.0, 30.0]);
        assert!((allocation.total() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn minimums_that_do_not_fit_are_infeasible() {
        let items = [BudgetItem::new("a", 60.0, 60.0), BudgetItem::new("b", 50.0, 80.0)];
        let err = HeightBudgetSolver::new().allocate(&items, 100.0).unwrap_err();
        assert_eq!(
            err,
            LayoutError::Infeasible {
                required: 110.0,
                available: 100.0
            }
        );
    }

    #[test]
    fn target_below_minimum_is_raised() {
        let item = BudgetItem::new("a", 12.0, 4.0);
        assert_eq!(item.target, 12.0);
    }
}
