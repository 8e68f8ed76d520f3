use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a `String`-backed identifier newtype with the display/serde
/// behavior every id in this crate needs. Keeps `SkillId` and `LearnerId`
/// from being interchangeable at a call site even though both are strings
/// underneath.
macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(SkillId, "Identifier of a `Skill` in a `SkillGraph`.");
string_id!(LearnerId, "Identifier of a learner owning a `LearnerModel`.");
string_id!(SessionId, "Identifier of a practice session.");
string_id!(EventId, "Identifier stamped onto a `NoesisEvent` by the event factory.");
string_id!(ItemId, "Identifier of a practice item presented to a learner.");
string_id!(TestId, "Identifier of a `TransferTest`.");
