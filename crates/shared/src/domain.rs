use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Declares a closed set of labels whose wire form is the exact display string
/// used by the dashboard (`"Not Rated"`, `"Super Admin"`, ...).
macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownLabel {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

label_enum!(Quarter {
    Q1 => "Q1",
    Q2 => "Q2",
    Q3 => "Q3",
    Q4 => "Q4",
});

label_enum!(
    /// Test status of a control.
    TestStatus {
        Pending => "Pending",
        Completed => "Completed",
        NotRated => "Not Rated",
        Fail => "Fail",
    }
);

label_enum!(
    /// Certification (assertion) status of a control.
    AssertionStatus {
        Due => "Due",
        Asserted => "Asserted",
        NotAsserted => "Not Asserted",
    }
);

label_enum!(
    /// `NotRated` is accepted on ingest but never produced by the generator.
    Effectiveness {
        Effective => "Effective",
        NotEffective => "Not Effective",
        NotRated => "Not Rated",
    }
);

label_enum!(Role {
    SuperAdmin => "Super Admin",
    Admin => "Admin",
    Viewer => "Viewer",
});

label_enum!(AuditStatus {
    Success => "Success",
    Reference => "Reference",
    Error => "Error",
});

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

/// One SOX control row as served to the dashboard and accepted by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Control {
    pub control_id: String,
    pub business_unit: String,
    pub process_name: String,
    pub process_id: String,
    pub control_owner: String,
    pub test_performer: String,
    pub control_title: String,
    pub control_description: String,
    pub test_title: String,
    pub test_procedure: String,
    pub quarter: Quarter,
    pub due_date: NaiveDate,
    pub status: TestStatus,
    pub assertion_status: AssertionStatus,
    pub effectiveness: Effectiveness,
    pub certification_due_date: NaiveDate,
    #[serde(rename = "ORELink", default, skip_serializing_if = "Option::is_none")]
    pub ore_link: Option<String>,
    #[serde(rename = "ORE_Number", default, skip_serializing_if = "Option::is_none")]
    pub ore_number: Option<String>,
    #[serde(rename = "ORE_Title", default, skip_serializing_if = "Option::is_none")]
    pub ore_title: Option<String>,
    #[serde(rename = "ORE_Owner", default, skip_serializing_if = "Option::is_none")]
    pub ore_owner: Option<String>,
}

/// Column order of the bulk-ingestion template.
pub const CONTROL_TEMPLATE_COLUMNS: [&str; 19] = [
    "ControlId",
    "BusinessUnit",
    "ProcessName",
    "ProcessId",
    "ControlTitle",
    "ControlDescription",
    "ControlOwner",
    "TestPerformer",
    "TestTitle",
    "TestProcedure",
    "Quarter",
    "DueDate",
    "Status",
    "AssertionStatus",
    "Effectiveness",
    "CertificationDueDate",
    "ORE_Number",
    "ORE_Title",
    "ORE_Owner",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiAggregate {
    pub certification_due: u64,
    pub control_not_asserted: u64,
    pub control_asserted: u64,
    pub test_pending: u64,
    pub pass_test: u64,
    pub not_rated_test: u64,
    pub fail_test: u64,
    pub control_effective: u64,
    pub control_not_effective: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarEventKind {
    DueDate,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub status: TestStatus,
    #[serde(rename = "type")]
    pub kind: CalendarEventKind,
    pub description: String,
    pub owner: String,
    pub business_unit: String,
    #[serde(rename = "ORE_Number", default, skip_serializing_if = "Option::is_none")]
    pub ore_number: Option<String>,
    #[serde(rename = "AssertionStatus")]
    pub assertion_status: AssertionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueUrgency {
    Critical,
    Warning,
    Normal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterProgress {
    pub passed: u64,
    pub failed: u64,
    pub pending: u64,
    pub not_rated: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterlyProgress {
    #[serde(rename = "Q1")]
    pub q1: QuarterProgress,
    #[serde(rename = "Q2")]
    pub q2: QuarterProgress,
    #[serde(rename = "Q3")]
    pub q3: QuarterProgress,
    #[serde(rename = "Q4")]
    pub q4: QuarterProgress,
}

impl QuarterlyProgress {
    pub fn quarter_mut(&mut self, quarter: Quarter) -> &mut QuarterProgress {
        match quarter {
            Quarter::Q1 => &mut self.q1,
            Quarter::Q2 => &mut self.q2,
            Quarter::Q3 => &mut self.q3,
            Quarter::Q4 => &mut self.q4,
        }
    }
}

/// Chart tallies for the dashboard's certification and effectiveness panels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessBreakdown {
    pub asserted: u64,
    pub not_asserted: u64,
    pub due: u64,
    pub effective: u64,
    pub ineffective: u64,
    pub not_tested: u64,
    pub quarterly: QuarterlyProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub designation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor_email: String,
    pub actor_name: String,
    pub action: String,
    pub details: String,
    pub status: AuditStatus,
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
