//! Deterministic mock control data for local runs and demos.

use chrono::{Days, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::domain::{AssertionStatus, Control, Effectiveness, Quarter, TestStatus};

const FISCAL_YEAR: i32 = 2025;

struct ControlTemplate {
    title: &'static str,
    description: &'static str,
    business_unit: &'static str,
    process: &'static str,
}

const TEMPLATES: [ControlTemplate; 8] = [
    ControlTemplate {
        title: "User Access Review - Active Directory",
        description: "Quarterly review of all active directory accounts to ensure access levels are appropriate.",
        business_unit: "IT",
        process: "Access Management",
    },
    ControlTemplate {
        title: "Weekly Inventory Reconciliation",
        description: "Reconciliation of physical inventory counts to GL balance every Friday.",
        business_unit: "Operations",
        process: "Inventory Management",
    },
    ControlTemplate {
        title: "Payroll Variation Analysis",
        description: "Review of payroll variance reports >$5k prior to disbursement.",
        business_unit: "HR",
        process: "Payroll Processing",
    },
    ControlTemplate {
        title: "Vendor Master File Review",
        description: "Periodic review of changes to vendor master data including bank details.",
        business_unit: "Finance",
        process: "Procurement",
    },
    ControlTemplate {
        title: "Change Management Authorization",
        description: "Verification that all production code changes have CAB approval.",
        business_unit: "IT",
        process: "Change Management",
    },
    ControlTemplate {
        title: "Bank Reconciliation Approval",
        description: "Monthly review and sign-off of bank reconciliations by Controller.",
        business_unit: "Finance",
        process: "Treasury",
    },
    ControlTemplate {
        title: "Physical Security Check",
        description: "Daily log review of badge access to sensitive server rooms.",
        business_unit: "Operations",
        process: "Physical Security",
    },
    ControlTemplate {
        title: "Employee Termination Access Removal",
        description: "Validation that access is revoked within 24 hours of separation.",
        business_unit: "HR",
        process: "Access Management",
    },
];

const OWNERS: [&str; 5] = ["Band 30", "Band 35", "Band 40", "Band 45", "Band 50"];

/// Builds `count` controls `CTL-1000`, `CTL-1001`, ... The same seed always
/// yields the same collection.
pub fn mock_controls(count: usize, seed: u64) -> Vec<Control> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|i| mock_control(i, &mut rng)).collect()
}

fn mock_control(i: usize, rng: &mut StdRng) -> Control {
    let template = &TEMPLATES[i % TEMPLATES.len()];
    let status = TestStatus::ALL[i % TestStatus::ALL.len()];
    let assertion_status = AssertionStatus::ALL[i % AssertionStatus::ALL.len()];

    // only completed tests can be rated effective, and one in ten of those fails review
    let effectiveness = if status == TestStatus::Completed && rng.gen_bool(0.9) {
        Effectiveness::Effective
    } else {
        Effectiveness::NotEffective
    };

    let quarter = Quarter::ALL[rng.gen_range(0..Quarter::ALL.len())];
    let due_date = due_date_for(quarter, rng);

    Control {
        control_id: format!("CTL-{}", 1000 + i),
        business_unit: template.business_unit.to_string(),
        process_name: template.process.to_string(),
        process_id: format!("PROC-{}", 100 + i),
        control_owner: OWNERS[i % OWNERS.len()].to_string(),
        test_performer: OWNERS[(i + 1) % OWNERS.len()].to_string(),
        control_title: template.title.to_string(),
        control_description: template.description.to_string(),
        test_title: format!("Test of {}", template.title),
        test_procedure: format!(
            "Verify evidence for {} in accordance with policy...",
            template.title
        ),
        quarter,
        due_date,
        status,
        assertion_status,
        effectiveness,
        certification_due_date: due_date,
        ore_link: None,
        ore_number: Some(format!("ORE-{FISCAL_YEAR}-{:04}", 100 + i)),
        ore_title: Some(format!("Operational Risk Event for {}", template.title)),
        ore_owner: Some(OWNERS[(i + 2) % OWNERS.len()].to_string()),
    }
}

/// Q1..Q3 anchor on the 15th of the quarter's first month; Q4 spreads across
/// the year boundary around Dec 27 so that due-date highlighting has both
/// overdue and upcoming rows to show.
fn due_date_for(quarter: Quarter, rng: &mut StdRng) -> NaiveDate {
    let anchor = |month, day| {
        NaiveDate::from_ymd_opt(FISCAL_YEAR, month, day).unwrap_or(NaiveDate::MIN)
    };
    match quarter {
        Quarter::Q1 => anchor(1, 15),
        Quarter::Q2 => anchor(4, 15),
        Quarter::Q3 => anchor(7, 15),
        Quarter::Q4 => {
            let base = anchor(12, 27);
            let offset: i64 = rng.gen_range(-20..20);
            if offset >= 0 {
                base.checked_add_days(Days::new(offset.unsigned_abs()))
            } else {
                base.checked_sub_days(Days::new(offset.unsigned_abs()))
            }
            .unwrap_or(base)
        }
    }
}

#[cfg(test)]
#[path = "tests/seed_tests.rs"]
mod tests;
