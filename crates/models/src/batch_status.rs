use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use strum::{EnumIter, EnumString};

#[cfg(feature = "database")]
use sea_orm::Value;

/// Lifecycle status of a batch (one cohort of a course)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatchStatus {
    /// Created, enrollment window not yet open
    #[default]
    Upcoming,
    /// Accepting enrollments
    Enrolling,
    /// Classes are running
    Ongoing,
    /// Terminal
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Enrolling => "enrolling",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }

    /// The only status reachable from this one, if any
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Upcoming => Some(Self::Enrolling),
            Self::Enrolling => Some(Self::Ongoing),
            Self::Ongoing => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn can_transition_to(&self, target: Self) -> bool {
        self.successor() == Some(target)
    }

    /// Statuses that at most one batch per course may hold at a time
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Enrolling | Self::Ongoing)
    }
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(feature = "database")]
impl sea_orm::sea_query::ValueType for BatchStatus {
    fn try_from(v: Value) -> Result<Self, sea_orm::sea_query::ValueTypeErr> {
        match v {
            Value::String(Some(s)) => s.parse().map_err(|_| sea_orm::sea_query::ValueTypeErr),
            _ => Err(sea_orm::sea_query::ValueTypeErr),
        }
    }

    fn type_name() -> String {
        "BatchStatus".to_string()
    }

    fn array_type() -> sea_orm::sea_query::ArrayType {
        sea_orm::sea_query::ArrayType::String
    }

    fn column_type() -> sea_orm::sea_query::ColumnType {
        sea_orm::sea_query::ColumnType::Text
    }
}

#[cfg(feature = "database")]
impl From<BatchStatus> for Value {
    fn from(status: BatchStatus) -> Self {
        Value::String(Some(Box::new(status.as_str().to_string())))
    }
}

#[cfg(feature = "database")]
impl sea_orm::TryGetable for BatchStatus {
    fn try_get_by<I: sea_orm::ColIdx>(
        res: &sea_orm::QueryResult,
        index: I,
    ) -> Result<Self, sea_orm::TryGetError> {
        let val: String = res.try_get_by(index)?;

        val.parse().map_err(|_| {
            sea_orm::TryGetError::DbErr(sea_orm::DbErr::Type(format!(
                "Unknown batch status: {val}"
            )))
        })
    }
}

#[cfg(feature = "database")]
impl sea_orm::sea_query::Nullable for BatchStatus {
    fn null() -> Value {
        Value::String(None)
    }
}
