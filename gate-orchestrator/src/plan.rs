// gate-orchestrator/src/plan.rs
// ============================================================================
// Module: plan
// Description: Per-task-type adapter plans (spec.md §4.3, §4.4-§4.7).
// ============================================================================

//! A plan is the fixed, ordered list of capabilities the Orchestrator runs
//! for a given [`gate_core::TaskType`]. Order encodes real data
//! dependencies (`code:map-functions` reads `diff.json`; link checking must
//! discover before it checks before it resamples) rather than being an
//! arbitrary convenience ordering.

use gate_core::TaskType;

/// One capability in a plan, with whether its absence is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStep {
    /// Adapter capability name, e.g. `"code:diff"`.
    pub capability: &'static str,
    /// Whether a missing or failing adapter for this capability is fatal.
    pub required: bool,
}

impl PlanStep {
    const fn required(capability: &'static str) -> Self {
        Self {
            capability,
            required: true,
        }
    }

    const fn optional(capability: &'static str) -> Self {
        Self {
            capability,
            required: false,
        }
    }
}

/// The ordered capability list for one task type.
#[derive(Debug, Clone, Copy)]
pub struct AdapterPlan {
    /// Capabilities in the order they must be invoked.
    pub steps: &'static [PlanStep],
}

impl AdapterPlan {
    /// Returns the plan for `task_type`. `TaskType::DbUpdate` has no
    /// adapter plan: the Gate Engine itself rejects it with
    /// `NO_PLAN_FOR_TYPE`, so the Orchestrator must not attempt measurement.
    #[must_use]
    pub const fn for_task_type(task_type: TaskType) -> Self {
        const CONTENT: &[PlanStep] = &[PlanStep::required("content:scan")];
        const CODE: &[PlanStep] = &[
            PlanStep::required("code:diff"),
            PlanStep::optional("code:lint"),
            PlanStep::optional("code:tests"),
            PlanStep::optional("code:coverage"),
            PlanStep::optional("code:build"),
            PlanStep::required("code:map-functions"),
        ];
        const LINK_CHECK: &[PlanStep] = &[
            PlanStep::required("links:discover"),
            PlanStep::required("links:check"),
            PlanStep::optional("links:resample"),
        ];
        const API_CHECK: &[PlanStep] = &[
            PlanStep::required("api:check"),
            PlanStep::optional("api:latency"),
        ];
        match task_type {
            TaskType::Content => Self { steps: CONTENT },
            TaskType::Code => Self { steps: CODE },
            TaskType::LinkCheck => Self { steps: LINK_CHECK },
            TaskType::ApiCheck => Self { steps: API_CHECK },
            TaskType::DbUpdate => Self { steps: &[] },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_plan_orders_diff_before_map_functions() {
        let plan = AdapterPlan::for_task_type(TaskType::Code);
        let diff_pos = plan.steps.iter().position(|step| step.capability == "code:diff").expect("diff present");
        let map_pos = plan.steps.iter().position(|step| step.capability == "code:map-functions").expect("map present");
        assert!(diff_pos < map_pos);
    }

    #[test]
    fn link_plan_orders_discover_check_resample() {
        let plan = AdapterPlan::for_task_type(TaskType::LinkCheck);
        let names: Vec<&str> = plan.steps.iter().map(|step| step.capability).collect();
        assert_eq!(names, ["links:discover", "links:check", "links:resample"]);
    }

    #[test]
    fn db_update_plan_is_empty() {
        let plan = AdapterPlan::for_task_type(TaskType::DbUpdate);
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn optional_steps_are_never_marked_required() {
        let plan = AdapterPlan::for_task_type(TaskType::Code);
        let lint = plan.steps.iter().find(|step| step.capability == "code:lint").expect("lint present");
        assert!(!lint.required);
    }
}
