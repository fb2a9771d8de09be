// strider-gait: the precomputed schedule that turns ticks into footsteps.

mod table;

pub use table::{Frame, Gait, GroupSize, LEG_COUNT};
