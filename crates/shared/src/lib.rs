pub mod clock;
pub mod error;
pub mod ids;

pub use clock::{Clock, IdGenerator};
pub use error::{GraphError, NoesisError, NoesisResult};
pub use ids::{EventId, ItemId, LearnerId, SessionId, SkillId, TestId};
