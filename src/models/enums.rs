use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(DocumentStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(ChatRole {
    User => "user",
    Assistant => "assistant",
});

impl DocumentStatus {
    /// Terminal states are never left by an automatic process.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `pending → processing → {completed, failed}`; `pending` may also
    /// jump straight to a terminal state (non-image uploads).
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Processing) => true,
            (Self::Pending | Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }

    /// Map any external status spelling into the closed set.
    ///
    /// Older clients and storage rows use `done`/`error` and a few
    /// in-flight labels; they are normalised here and nowhere else.
    pub fn from_external(raw: &str) -> Option<DocumentStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "uploaded" | "queued" => Some(Self::Pending),
            "processing" | "analyzing" | "analysing" => Some(Self::Processing),
            "completed" | "complete" | "done" => Some(Self::Completed),
            "failed" | "error" => Some(Self::Failed),
            _ => None,
        }
    }
}
