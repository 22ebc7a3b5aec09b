use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExemptionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseholdId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl fmt::Display for ExemptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar month, serialized as `"2024-04"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month(NaiveDate);

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| EngineError::validation(format!("{year}-{month:02} is not a month")))
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self(date - Days::new(u64::from(date.day0())))
    }

    pub const fn first_day(self) -> NaiveDate {
        self.0
    }

    pub fn starts_at(self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }

    fn ordinal(self) -> i64 {
        i64::from(self.0.year()) * 12 + i64::from(self.0.month0())
    }

    /// Whole months from `earlier` to `self`; negative when `earlier` is later.
    pub fn months_since(self, earlier: Month) -> i64 {
        self.ordinal() - earlier.ordinal()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0.year(), self.0.month())
    }
}

impl FromStr for Month {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::validation(format!("'{raw}' is not a YYYY-MM month"));
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Month {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(value: Month) -> Self {
        value.to_string()
    }
}

/// Inclusive range of months an exemption claims to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PeriodBounds")]
pub struct MonthPeriod {
    pub first: Month,
    pub last: Month,
}

#[derive(Deserialize)]
struct PeriodBounds {
    first: Month,
    last: Month,
}

impl TryFrom<PeriodBounds> for MonthPeriod {
    type Error = EngineError;

    fn try_from(bounds: PeriodBounds) -> Result<Self, Self::Error> {
        Self::new(bounds.first, bounds.last)
    }
}

impl MonthPeriod {
    pub fn new(first: Month, last: Month) -> Result<Self, EngineError> {
        if last < first {
            return Err(EngineError::validation(format!(
                "period ends ({last}) before it starts ({first})"
            )));
        }
        Ok(Self { first, last })
    }

    pub fn single(month: Month) -> Self {
        Self {
            first: month,
            last: month,
        }
    }

    pub fn contains(&self, month: Month) -> bool {
        self.first <= month && month <= self.last
    }

    pub fn overlaps(&self, other: &MonthPeriod) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}..{}", self.first, self.last)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionType {
    Homeless,
    Disabled,
    Student,
    Caregiver,
    #[serde(rename = "employed_20h")]
    EmployedTwentyHours,
    TrainingProgram,
    MedicallyCertified,
    Other,
}

impl ExemptionType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Homeless => "homeless",
            Self::Disabled => "disabled",
            Self::Student => "student",
            Self::Caregiver => "caregiver",
            Self::EmployedTwentyHours => "employed 20+ hours per week",
            Self::TrainingProgram => "training program",
            Self::MedicallyCertified => "medically certified",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionStatus {
    Pending,
    Verified,
    Denied,
    /// Never stored; reported once a verified record passes `expires_at`.
    Expired,
}

impl ExemptionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Denied => "denied",
            Self::Expired => "expired",
        }
    }
}

/// Staff action on a pending exemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum StaffDecision {
    Verify {
        method: String,
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    },
    Deny {
        reason: String,
    },
}

/// Caller input for a new exemption claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionDraft {
    pub household: HouseholdId,
    pub member: MemberId,
    pub period: MonthPeriod,
    pub exemption_type: ExemptionType,
}

/// Serialized records are re-checked on the way in: a stored status of
/// expired, or a decision missing its audit fields, is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredExemption")]
pub struct ExemptionRecord {
    pub id: ExemptionId,
    pub household: HouseholdId,
    pub member: MemberId,
    pub period: MonthPeriod,
    pub exemption_type: ExemptionType,
    status: ExemptionStatus,
    #[serde(default)]
    pub verification_method: Option<String>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub denial_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct StoredExemption {
    id: ExemptionId,
    household: HouseholdId,
    member: MemberId,
    period: MonthPeriod,
    exemption_type: ExemptionType,
    status: ExemptionStatus,
    #[serde(default)]
    verification_method: Option<String>,
    #[serde(default)]
    verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    denial_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoredExemption> for ExemptionRecord {
    type Error = EngineError;

    fn try_from(stored: StoredExemption) -> Result<Self, Self::Error> {
        let id = &stored.id;
        match stored.status {
            ExemptionStatus::Expired => {
                return Err(EngineError::validation(format!(
                    "exemption {id} stores status expired; expiry is derived from expires_at"
                )));
            }
            ExemptionStatus::Verified => {
                let has_method = stored
                    .verification_method
                    .as_deref()
                    .is_some_and(|method| !method.trim().is_empty());
                if !has_method || stored.verified_at.is_none() {
                    return Err(EngineError::validation(format!(
                        "verified exemption {id} is missing its verification method or time"
                    )));
                }
            }
            ExemptionStatus::Denied if stored.denial_reason.is_none() => {
                return Err(EngineError::validation(format!(
                    "denied exemption {id} is missing its denial reason"
                )));
            }
            ExemptionStatus::Denied | ExemptionStatus::Pending => {}
        }

        Ok(Self {
            id: stored.id,
            household: stored.household,
            member: stored.member,
            period: stored.period,
            exemption_type: stored.exemption_type,
            status: stored.status,
            verification_method: stored.verification_method,
            verified_at: stored.verified_at,
            expires_at: stored.expires_at,
            denial_reason: stored.denial_reason,
            created_at: stored.created_at,
        })
    }
}

impl ExemptionRecord {
    pub fn pending(id: ExemptionId, draft: ExemptionDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            household: draft.household,
            member: draft.member,
            period: draft.period,
            exemption_type: draft.exemption_type,
            status: ExemptionStatus::Pending,
            verification_method: None,
            verified_at: None,
            expires_at: None,
            denial_reason: None,
            created_at,
        }
    }

    /// Status as last written by staff, without expiry applied.
    pub const fn stored_status(&self) -> ExemptionStatus {
        self.status
    }

    /// Status as observed at `now`; verified records past `expires_at` read as expired.
    pub fn status_at(&self, now: DateTime<Utc>) -> ExemptionStatus {
        match (self.status, self.expires_at) {
            (ExemptionStatus::Verified, Some(expires_at)) if now > expires_at => {
                ExemptionStatus::Expired
            }
            (status, _) => status,
        }
    }

    /// Pending or verified-and-unexpired records block an overlapping claim.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status_at(now),
            ExemptionStatus::Pending | ExemptionStatus::Verified
        )
    }

    /// Whether this record exempts `month` from counting.
    ///
    /// Coverage is judged at the start of the month, so an exemption that
    /// lapses later keeps the months it already covered.
    pub fn suppresses(&self, month: Month) -> bool {
        self.period.contains(month)
            && self.status_at(month.starts_at()) == ExemptionStatus::Verified
    }

    pub fn same_subject(&self, household: &HouseholdId, member: &MemberId) -> bool {
        &self.household == household && &self.member == member
    }

    /// Apply a staff decision, returning the updated record.
    pub fn decide(&self, decision: StaffDecision, now: DateTime<Utc>) -> Result<Self, EngineError> {
        if self.status != ExemptionStatus::Pending {
            return Err(EngineError::validation(format!(
                "exemption {} is {}; only pending exemptions accept a decision",
                self.id,
                self.status_at(now).label()
            )));
        }

        let mut next = self.clone();
        match decision {
            StaffDecision::Verify { method, expires_at } => {
                if method.trim().is_empty() {
                    return Err(EngineError::validation(
                        "verification method must be recorded",
                    ));
                }
                if let Some(expires_at) = expires_at {
                    if expires_at <= now {
                        return Err(EngineError::validation(format!(
                            "exemption {} would already be expired at verification",
                            self.id
                        )));
                    }
                }
                next.status = ExemptionStatus::Verified;
                next.verification_method = Some(method);
                next.verified_at = Some(now);
                next.expires_at = expires_at;
            }
            StaffDecision::Deny { reason } => {
                next.status = ExemptionStatus::Denied;
                next.denial_reason = Some(reason);
            }
        }
        Ok(next)
    }
}
