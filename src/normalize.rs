//! Turns one raw form submission into a validated `NormalizedSubmission`.
//! Pure: never touches storage. Field rules follow the weekly form export —
//! parent name/phone mandatory, up to three child blocks, empty child names
//! skipped silently, out-of-set genders coerced to Male with a warning.

use chrono::NaiveDate;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::IngestError;
use crate::models::{
    child::ChildCandidate,
    parent::ParentCandidate,
    Gender, Service,
};

/// One row of the form's CSV export, column names as the sheet publishes
/// them. Columns absent from older exports deserialize as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Timestamp", default)]
    pub timestamp: String,
    #[serde(rename = "Your Name", default)]
    pub parent_name: String,
    #[serde(rename = "Your Phone", default)]
    pub parent_phone: String,
    #[serde(rename = "Your Gender", default)]
    pub parent_gender: String,
    #[serde(rename = "Your Email", default)]
    pub parent_email: String,
    #[serde(rename = "Secondary Phone Number", default)]
    pub secondary_phone: String,
    #[serde(rename = "Role In Church", default)]
    pub role_in_church: String,
    #[serde(rename = "Department In Church", default)]
    pub department_in_church: String,
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "Which Service", default)]
    pub service: String,

    #[serde(rename = "Child 1 Name", default)]
    pub child1_name: String,
    #[serde(rename = "Child 1 Age", default)]
    pub child1_age: String,
    #[serde(rename = "Child 1 Gender", default)]
    pub child1_gender: String,
    #[serde(rename = "Child 1 Birth Date", default)]
    pub child1_birth_date: String,
    #[serde(rename = "Child 1 Special Needs", default)]
    pub child1_special_needs: String,
    #[serde(rename = "Child 1 Allergies", default)]
    pub child1_allergies: String,
    #[serde(rename = "Relationship With Child 1", default)]
    pub child1_relationship: String,

    #[serde(rename = "Child 2 Name", default)]
    pub child2_name: String,
    #[serde(rename = "Child 2 Age", default)]
    pub child2_age: String,
    #[serde(rename = "Child 2 Gender", default)]
    pub child2_gender: String,
    #[serde(rename = "Child 2 Birth Date", default)]
    pub child2_birth_date: String,
    #[serde(rename = "Child 2 Special Needs", default)]
    pub child2_special_needs: String,
    #[serde(rename = "Child 2 Allergies", default)]
    pub child2_allergies: String,
    #[serde(rename = "Relationship With Child 2", default)]
    pub child2_relationship: String,

    #[serde(rename = "Child 3 Name", default)]
    pub child3_name: String,
    #[serde(rename = "Child 3 Age", default)]
    pub child3_age: String,
    #[serde(rename = "Child 3 Gender", default)]
    pub child3_gender: String,
    #[serde(rename = "Child 3 Birth Date", default)]
    pub child3_birth_date: String,
    #[serde(rename = "Child 3 Special Needs", default)]
    pub child3_special_needs: String,
    #[serde(rename = "Child 3 Allergies", default)]
    pub child3_allergies: String,
    #[serde(rename = "Relationship With Child 3", default)]
    pub child3_relationship: String,
}

/// One child block of the raw row, by slot number (1-3).
struct RawChild<'a> {
    slot: usize,
    name: &'a str,
    age: &'a str,
    gender: &'a str,
    birth_date: &'a str,
    special_needs: &'a str,
    allergies: &'a str,
    relationship: &'a str,
}

impl RawRow {
    fn child_blocks(&self) -> [RawChild<'_>; 3] {
        [
            RawChild {
                slot: 1,
                name: &self.child1_name,
                age: &self.child1_age,
                gender: &self.child1_gender,
                birth_date: &self.child1_birth_date,
                special_needs: &self.child1_special_needs,
                allergies: &self.child1_allergies,
                relationship: &self.child1_relationship,
            },
            RawChild {
                slot: 2,
                name: &self.child2_name,
                age: &self.child2_age,
                gender: &self.child2_gender,
                birth_date: &self.child2_birth_date,
                special_needs: &self.child2_special_needs,
                allergies: &self.child2_allergies,
                relationship: &self.child2_relationship,
            },
            RawChild {
                slot: 3,
                name: &self.child3_name,
                age: &self.child3_age,
                gender: &self.child3_gender,
                birth_date: &self.child3_birth_date,
                special_needs: &self.child3_special_needs,
                allergies: &self.child3_allergies,
                relationship: &self.child3_relationship,
            },
        ]
    }
}

/// A fully validated submission ready for resolution.
#[derive(Debug, Clone)]
pub struct NormalizedSubmission {
    pub parent: ParentCandidate,
    pub children: Vec<ChildCandidate>,
    pub service: Service,
    pub attendance_date: NaiveDate,
    /// Non-fatal cleanups applied (gender coercions, unparsable ages with a
    /// usable birthdate). Surfaced in the batch report.
    pub warnings: Vec<String>,
}

fn clean(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Out-of-set genders are coerced to Male with a warning, never rejected.
/// This mirrors the form's historical behavior; see DESIGN.md before
/// changing it.
fn parse_gender(raw: &str, field: &str, warnings: &mut Vec<String>) -> Gender {
    match Gender::from_str(raw) {
        Ok(g) => g,
        Err(_) => {
            warnings.push(format!("{field}: invalid gender '{}', defaulting to Male", raw.trim()));
            Gender::Male
        }
    }
}

/// The sheet's timestamp column as exported by the form; empty means "use
/// the processing date".
fn parse_attendance_date(raw: &str, as_of: NaiveDate) -> Result<NaiveDate, IngestError> {
    let t = raw.trim();
    if t.is_empty() {
        return Ok(as_of);
    }
    // Form exports use M/D/Y H:M:S; accept ISO dates too for re-submissions.
    for fmt in ["%m/%d/%Y %H:%M:%S", "%m/%d/%Y", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(t, fmt) {
            return Ok(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Ok(d);
        }
    }
    Err(IngestError::Validation {
        field: "timestamp".into(),
        reason: format!("malformed timestamp '{t}'"),
    })
}

fn normalize_child(
    raw: &RawChild<'_>,
    warnings: &mut Vec<String>,
) -> Result<Option<ChildCandidate>, IngestError> {
    let Some(full_name) = clean(raw.name) else {
        // Empty child slots are expected; skip without noise.
        return Ok(None);
    };

    let slot = raw.slot;
    let birth_date = match clean(raw.birth_date) {
        Some(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&s, "%m/%d/%Y"))
        {
            Ok(d) => Some(d),
            Err(_) => {
                return Err(IngestError::Validation {
                    field: format!("child_{slot}_birth_date"),
                    reason: format!("malformed date '{s}'"),
                })
            }
        },
        None => None,
    };

    let age = match clean(raw.age) {
        Some(s) => match s.parse::<i32>() {
            Ok(n) => Some(n),
            Err(_) if birth_date.is_some() => {
                warnings.push(format!(
                    "child_{slot}_age: non-numeric '{s}', deriving from birth date"
                ));
                None
            }
            Err(_) => {
                return Err(IngestError::Validation {
                    field: format!("child_{slot}_age"),
                    reason: format!("non-numeric age '{s}' and no birth date"),
                })
            }
        },
        None if birth_date.is_some() => None,
        None => {
            return Err(IngestError::Validation {
                field: format!("child_{slot}_age"),
                reason: "age and birth date both missing".into(),
            })
        }
    };

    let gender = parse_gender(raw.gender, &format!("child_{slot}_gender"), warnings);

    Ok(Some(ChildCandidate {
        full_name,
        gender,
        age,
        birth_date,
        special_needs: clean(raw.special_needs),
        allergies: clean(raw.allergies),
        relationship_to_parent: clean(raw.relationship),
    }))
}

/// Validate one raw row. `as_of` is the processing date used when the
/// timestamp column is empty.
pub fn normalize_row(raw: &RawRow, as_of: NaiveDate) -> Result<NormalizedSubmission, IngestError> {
    let mut warnings = Vec::new();

    let full_name = clean(&raw.parent_name).ok_or_else(|| IngestError::Validation {
        field: "parent_name".into(),
        reason: "missing parent name".into(),
    })?;
    let phone_number = clean(&raw.parent_phone).ok_or_else(|| IngestError::Validation {
        field: "parent_phone".into(),
        reason: "missing parent phone".into(),
    })?;

    let gender = parse_gender(&raw.parent_gender, "parent_gender", &mut warnings);
    let service = Service::parse(raw.service.trim())?;
    let attendance_date = parse_attendance_date(&raw.timestamp, as_of)?;

    let parent = ParentCandidate {
        full_name,
        gender,
        email: clean(&raw.parent_email),
        phone_number: Some(phone_number),
        secondary_phone_number: clean(&raw.secondary_phone),
        role_in_church: clean(&raw.role_in_church),
        department_in_church: clean(&raw.department_in_church),
        address: clean(&raw.address),
    };

    let mut children = Vec::new();
    for block in raw.child_blocks() {
        if let Some(candidate) = normalize_child(&block, &mut warnings)? {
            children.push(candidate);
        }
    }

    Ok(NormalizedSubmission {
        parent,
        children,
        service,
        attendance_date,
        warnings,
    })
}
