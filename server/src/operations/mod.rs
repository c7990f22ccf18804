//! Concrete operations driven by the dispatch loop.

mod combat;
mod condition;
mod login;
mod movement;
mod spawn;
mod speech;
mod think;

pub use combat::{AttackOperation, AutoAttackOperation};
pub use condition::ConditionOperation;
pub use login::{LoginOperation, LogoutOperation, TEMPLE_RADIUS};
pub use movement::{MoveOperation, WalkToOperation};
pub use spawn::SpawnOperation;
pub use speech::SpeechOperation;
pub use think::ThinkOperation;
