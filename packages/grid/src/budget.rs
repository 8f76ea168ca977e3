//! API call estimates for a sampling grid.

use crate::GridError;

/// Bounds on the number of search calls a grid will issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEstimate {
    /// Number of sampling points.
    pub points: u64,
    /// One call per point (no point has a second page).
    pub min_calls: u64,
    /// Every point paginates to the page cap.
    pub max_calls: u64,
}

/// Estimates the call range for `points` sampling points fetched with at
/// most `max_pages` pages each.
#[must_use]
pub fn estimate_calls(points: u64, max_pages: u32) -> CallEstimate {
    CallEstimate {
        points,
        min_calls: points,
        max_calls: points.saturating_mul(u64::from(max_pages.max(1))),
    }
}

/// Fails when even the minimum call count exceeds `budget`, and warns when
/// only the worst case does.
///
/// # Errors
///
/// Returns [`GridError::OverBudget`] if `estimate.min_calls > budget`.
pub fn check_budget(estimate: &CallEstimate, budget: Option<u64>) -> Result<(), GridError> {
    let Some(budget) = budget else {
        return Ok(());
    };

    if estimate.min_calls > budget {
        return Err(GridError::OverBudget {
            required: estimate.min_calls,
            budget,
        });
    }

    if estimate.max_calls > budget {
        log::warn!(
            "Worst case of {} calls exceeds the budget of {budget}; \
             dense tiles that paginate fully may exhaust it",
            estimate.max_calls
        );
    }

    Ok(())
}
