//! Status and kind enums shared by the repositories
//!
//! Stored as lowercase TEXT columns and serialized the same way in JSON.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum!(
    /// How a token holding came to exist
    AcquiredVia {
        Purchase => "purchase",
        Like => "like",
        Share => "share",
        Mint => "mint",
    }
);

text_enum!(
    /// Engagement recorded against a post
    EngagementKind {
        Like => "like",
        Share => "share",
    }
);

text_enum!(
    DistributionStatus {
        Distributing => "distributing",
        Completed => "completed",
    }
);

text_enum!(
    ClaimStatus {
        Pending => "pending",
        Claimed => "claimed",
        Expired => "expired",
    }
);

text_enum!(
    ProposalStatus {
        Active => "active",
        Closed => "closed",
    }
);

text_enum!(
    /// Ballot choice on a governance proposal
    VoteChoice {
        Yes => "yes",
        No => "no",
        Abstain => "abstain",
    }
);

impl EngagementKind {
    /// Tokens awarded for this engagement
    pub fn tokens_awarded(&self) -> i64 {
        match self {
            Self::Like => 1,
            Self::Share => 10,
        }
    }

    pub fn acquired_via(&self) -> AcquiredVia {
        match self {
            Self::Like => AcquiredVia::Like,
            Self::Share => AcquiredVia::Share,
        }
    }
}
