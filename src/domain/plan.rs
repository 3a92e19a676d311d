use uuid::Uuid;

use super::template::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PlanType {
    Default,
    Custom,
}

/// One step in a plan. Step 0 is the initial send; `wait_days` is the gap
/// from the previous step's scheduled date (ignored for step 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpStep {
    pub step_number: u32,
    pub wait_days: u32,
    pub template_id: Uuid,
}

/// Ordered cadence for a recipient sequence. Step numbers are contiguous from
/// 0, and each step's `step_number` equals its index in `steps` — enforced at
/// construction so the invariant can never be violated downstream.
#[derive(Debug, Clone)]
pub struct FollowUpPlan {
    pub id: Uuid,
    pub plan_type: PlanType,
    steps: Vec<FollowUpStep>,
}

impl FollowUpPlan {
    pub fn new(
        id: Uuid,
        plan_type: PlanType,
        mut steps: Vec<FollowUpStep>,
    ) -> Result<Self, String> {
        steps.sort_by_key(|s| s.step_number);
        for (index, step) in steps.iter().enumerate() {
            if step.step_number != index as u32 {
                return Err(format!(
                    "step numbers must be contiguous from 0: expected {index}, got {}",
                    step.step_number
                ));
            }
        }
        if steps.is_empty() {
            return Err("a plan must have at least an initial step".to_string());
        }
        Ok(Self { id, plan_type, steps })
    }

    pub fn steps(&self) -> &[FollowUpStep] { &self.steps }

    /// Highest valid follow-up index: `|steps| - 1`.
    pub fn max_followup_index(&self) -> u32 { self.steps.len() as u32 - 1 }

    pub fn step(
        &self,
        step_number: u32,
    ) -> Option<&FollowUpStep> {
        self.steps.get(step_number as usize)
    }
}

/// A plan with each step's template attached, one-to-one, in step order.
pub struct PlanWithTemplate {
    pub plan: FollowUpPlan,
    templates: Vec<Template>,
}

impl PlanWithTemplate {
    pub fn new(
        plan: FollowUpPlan,
        templates: Vec<Template>,
    ) -> Result<Self, String> {
        if templates.len() != plan.steps().len() {
            return Err(format!(
                "plan has {} steps but {} templates were given",
                plan.steps().len(),
                templates.len()
            ));
        }
        Ok(Self { plan, templates })
    }

    pub fn template_for_step(
        &self,
        step_number: u32,
    ) -> Option<&Template> {
        self.templates.get(step_number as usize)
    }

    pub fn max_followup_index(&self) -> u32 { self.plan.max_followup_index() }
}

#[cfg(test)]
mod tests {
    use claims::assert_err;
    use claims::assert_ok;
    use uuid::Uuid;

    use super::FollowUpPlan;
    use super::FollowUpStep;
    use super::PlanType;

    fn step(
        n: u32,
        wait: u32,
    ) -> FollowUpStep {
        FollowUpStep { step_number: n, wait_days: wait, template_id: Uuid::new_v4() }
    }

    #[test]
    fn contiguous_steps_ok() {
        let plan = assert_ok!(FollowUpPlan::new(
            Uuid::new_v4(),
            PlanType::Default,
            vec![step(0, 0), step(1, 3)]
        ));
        assert_eq!(plan.max_followup_index(), 1);
    }

    #[test]
    fn gap_in_step_numbers_rejected() {
        assert_err!(FollowUpPlan::new(Uuid::new_v4(), PlanType::Default, vec![step(0, 0), step(2, 3)]));
    }

    #[test]
    fn empty_plan_rejected() {
        assert_err!(FollowUpPlan::new(Uuid::new_v4(), PlanType::Default, vec![]));
    }
}
