//! Emergency advance risk check.
//!
//! A fixed sequence of five stages, each a plain rule over data the
//! service already holds. No model is involved; the score is the share of
//! passed stages. Every stage runs even after a failure so the client can
//! show the whole report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Limits configured for emergency advances.
#[derive(Debug, Clone, Copy)]
pub struct AdvancePolicy {
    /// Largest advance a single request may disburse
    pub max_amount_cents: i64,

    /// Minimum profile age in days
    pub min_account_age_days: i64,

    /// Trailing 90-day credits must reach `multiplier * amount`; 0 disables the stage
    pub income_multiplier: i64,
}

/// Facts about the requesting profile gathered before assessment.
#[derive(Debug, Clone)]
pub struct RiskInputs {
    pub amount_cents: i64,
    pub has_email: bool,
    pub has_full_name: bool,
    pub profile_created_at: DateTime<Utc>,
    pub credits_last_90_days_cents: i64,
    pub outstanding_advances: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStage {
    Identity,
    AccountAge,
    IncomeHistory,
    OutstandingAdvances,
    AmountLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: RiskStage,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Declined,
}

/// Outcome of the five-stage check, persisted with each advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub decision: Decision,
    pub score: u8,
    pub amount_cents: i64,
    pub stages: Vec<StageResult>,
}

impl RiskReport {
    pub fn approved(&self) -> bool {
        self.decision == Decision::Approved
    }
}

const INCOME_WINDOW_DAYS: i64 = 90;

/// Run all stages against `inputs` at time `now`.
pub fn assess(inputs: &RiskInputs, policy: &AdvancePolicy, now: DateTime<Utc>) -> RiskReport {
    let mut stages = Vec::with_capacity(5);

    let identity_ok = inputs.has_email && inputs.has_full_name;
    stages.push(StageResult {
        stage: RiskStage::Identity,
        passed: identity_ok,
        detail: if identity_ok {
            "Profile identity complete".to_string()
        } else {
            "Profile needs an email and full name".to_string()
        },
    });

    let age_days = (now - inputs.profile_created_at).num_days();
    stages.push(StageResult {
        stage: RiskStage::AccountAge,
        passed: age_days >= policy.min_account_age_days,
        detail: format!(
            "Account age {} days (minimum {})",
            age_days, policy.min_account_age_days
        ),
    });

    let required_income = policy.income_multiplier.saturating_mul(inputs.amount_cents);
    stages.push(StageResult {
        stage: RiskStage::IncomeHistory,
        passed: inputs.credits_last_90_days_cents >= required_income,
        detail: format!(
            "Credits over last {} days: {} cents (required {})",
            INCOME_WINDOW_DAYS, inputs.credits_last_90_days_cents, required_income
        ),
    });

    stages.push(StageResult {
        stage: RiskStage::OutstandingAdvances,
        passed: inputs.outstanding_advances == 0,
        detail: format!("{} outstanding advance(s)", inputs.outstanding_advances),
    });

    let amount_ok = inputs.amount_cents > 0 && inputs.amount_cents <= policy.max_amount_cents;
    stages.push(StageResult {
        stage: RiskStage::AmountLimit,
        passed: amount_ok,
        detail: format!(
            "Requested {} cents (limit {})",
            inputs.amount_cents, policy.max_amount_cents
        ),
    });

    let passed = stages.iter().filter(|s| s.passed).count();
    let score = (passed * 100 / stages.len()) as u8;
    let decision = if passed == stages.len() {
        Decision::Approved
    } else {
        Decision::Declined
    };

    RiskReport {
        decision,
        score,
        amount_cents: inputs.amount_cents,
        stages,
    }
}

/// Start of the trailing income window used by the income stage.
pub fn income_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::days(INCOME_WINDOW_DAYS)
}
