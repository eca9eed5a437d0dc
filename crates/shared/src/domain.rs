use std::{
    collections::BTreeSet,
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::error::ParseStatusError;

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

name_newtype!(ComponentId);
name_newtype!(EventId);

const WILDCARD_EVENT_ID: &str = "*";
const WILDCARD_STATUS: &str = "*";

impl EventId {
    /// The bucket every handler registered for "all events" lives in.
    pub fn all() -> Self {
        Self(WILDCARD_EVENT_ID.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD_EVENT_ID
    }
}

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of whatever registered a handler. Owners are explicit tokens
/// handed out at setup time and used again at teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl OwnerId {
    pub fn next() -> Self {
        Self(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Initialized,
    Idle,
    Loading,
    Loaded,
    Failed,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Initialized,
        Status::Idle,
        Status::Loading,
        Status::Loaded,
        Status::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Initialized => "INITIALIZED",
            Status::Idle => "IDLE",
            Status::Loading => "LOADING",
            Status::Loaded => "LOADED",
            Status::Failed => "FAILED",
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Status::Loaded | Status::Failed)
    }

    /// Lifecycle table. Re-writing the current status is always allowed.
    pub fn can_transition_to(self, next: Status) -> bool {
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Status::Initialized, Status::Idle)
                | (Status::Idle, Status::Loading)
                | (Status::Loading, Status::Loaded)
                | (Status::Loading, Status::Failed)
                | (Status::Loaded, Status::Idle)
                | (Status::Failed, Status::Idle)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError::new(s))
    }
}

/// Which statuses a Model stream should emit for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum StatusFilter {
    Any,
    Only(BTreeSet<Status>),
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::settled()
    }
}

impl StatusFilter {
    pub fn any() -> Self {
        Self::Any
    }

    pub fn settled() -> Self {
        Self::only([Status::Loaded, Status::Failed])
    }

    pub fn only(statuses: impl IntoIterator<Item = Status>) -> Self {
        Self::Only(statuses.into_iter().collect())
    }

    pub fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Only(statuses) => statuses.contains(&status),
        }
    }

    /// `"*"` anywhere in the list widens the filter to every status.
    pub fn parse<I, S>(items: I) -> Result<Self, ParseStatusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut statuses = BTreeSet::new();
        for item in items {
            let item = item.as_ref();
            if item.trim() == WILDCARD_STATUS {
                return Ok(Self::Any);
            }
            statuses.insert(item.parse::<Status>()?);
        }
        Ok(Self::Only(statuses))
    }
}

impl TryFrom<Vec<String>> for StatusFilter {
    type Error = ParseStatusError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StatusFilter> for Vec<String> {
    fn from(value: StatusFilter) -> Self {
        match value {
            StatusFilter::Any => vec![WILDCARD_STATUS.to_string()],
            StatusFilter::Only(statuses) => statuses
                .into_iter()
                .map(|status| status.as_str().to_string())
                .collect(),
        }
    }
}
