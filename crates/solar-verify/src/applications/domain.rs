use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, store-assigned identifier for a persisted application.
///
/// The canonical form is 24 lowercase hexadecimal characters; anything else
/// is rejected at the boundary with [`InvalidIdentifierError`] rather than
/// being folded into field validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentifierError> {
        let trimmed = raw.trim();
        if trimmed.len() == 24 && trimmed.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(InvalidIdentifierError {
                raw: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ApplicationId {
    type Err = InvalidIdentifierError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

/// Raised when a caller-supplied identifier is not syntactically valid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{raw}' is not a valid application id")]
pub struct InvalidIdentifierError {
    pub raw: String,
}

/// Stable identifier of an authenticated principal (the application owner).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Installation metadata declared by the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationFacts {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub system_capacity_kw: f64,
    pub declared_panel_count: u32,
}

impl InstallationFacts {
    /// Records every violated constraint; never stops at the first failure.
    pub fn validate_into(&self, report: &mut ValidationReport) {
        if self.address.trim().is_empty() {
            report.flag("address", "address must not be empty");
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            report.flag("latitude", "latitude must be between -90 and 90");
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            report.flag("longitude", "longitude must be between -180 and 180");
        }
        if !self.system_capacity_kw.is_finite() || self.system_capacity_kw <= 0.0 {
            report.flag("system_capacity_kw", "system capacity must be a positive number of kW");
        }
        if self.declared_panel_count == 0 {
            report.flag("declared_panel_count", "panel count must be a positive integer");
        }
    }
}

/// The three mandatory evidence slots every application must fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    WideRooftop,
    SerialNumber,
    Inverter,
}

impl EvidenceKind {
    pub const ALL: [EvidenceKind; 3] = [
        EvidenceKind::WideRooftop,
        EvidenceKind::SerialNumber,
        EvidenceKind::Inverter,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            EvidenceKind::WideRooftop => "wide_rooftop_photo",
            EvidenceKind::SerialNumber => "serial_number_photo",
            EvidenceKind::Inverter => "inverter_photo",
        }
    }
}

/// Raw evidence bytes collected at intake, one optional slot per kind.
///
/// Presence and non-emptiness are validated together with the installation
/// facts so a submission fails with the complete list of problems.
#[derive(Debug, Clone, Default)]
pub struct EvidenceUploads {
    pub wide_rooftop: Option<Vec<u8>>,
    pub serial_number: Option<Vec<u8>>,
    pub inverter: Option<Vec<u8>>,
}

impl EvidenceUploads {
    pub fn slot(&self, kind: EvidenceKind) -> Option<&[u8]> {
        match kind {
            EvidenceKind::WideRooftop => self.wide_rooftop.as_deref(),
            EvidenceKind::SerialNumber => self.serial_number.as_deref(),
            EvidenceKind::Inverter => self.inverter.as_deref(),
        }
    }

    pub fn set(&mut self, kind: EvidenceKind, content: Vec<u8>) {
        match kind {
            EvidenceKind::WideRooftop => self.wide_rooftop = Some(content),
            EvidenceKind::SerialNumber => self.serial_number = Some(content),
            EvidenceKind::Inverter => self.inverter = Some(content),
        }
    }

    pub fn validate_into(&self, report: &mut ValidationReport) {
        for kind in EvidenceKind::ALL {
            match self.slot(kind) {
                None => report.flag(kind.label(), "evidence photo is required"),
                Some(content) if content.is_empty() => {
                    report.flag(kind.label(), "evidence photo must not be empty");
                }
                Some(_) => {}
            }
        }
    }
}

/// Lifecycle status of an application. Transitions are monotonic along
/// `Submitted -> Verifying -> {Approved, Rejected, ManualReview}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Verifying,
    Approved,
    Rejected,
    ManualReview,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Verifying => "verifying",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::ManualReview => "manual_review",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved
                | ApplicationStatus::Rejected
                | ApplicationStatus::ManualReview
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Final decision attached to a completed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Rejected,
    ManualReview,
}

impl Verdict {
    pub const fn terminal_status(self) -> ApplicationStatus {
        match self {
            Verdict::Approved => ApplicationStatus::Approved,
            Verdict::Rejected => ApplicationStatus::Rejected,
            Verdict::ManualReview => ApplicationStatus::ManualReview,
        }
    }
}

/// Single observation produced by the verification pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub check: String,
    pub observation: String,
}

/// Immutable verification outcome stored alongside a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    pub completed_at: DateTime<Utc>,
}

/// Accumulator for intake validation so every violated field is reported.
#[derive(Debug, Default)]
pub struct ValidationReport {
    violations: Vec<FieldViolation>,
}

impl ValidationReport {
    pub fn flag(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.violations,
            })
        }
    }
}

/// One violated intake constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Aggregated intake validation failure listing every violated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|violation| violation.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
