//! Tempo Curves
//!
//! Values that vary over simulation time. A curve is queried by timestamp
//! instead of holding a single current value.
//!
//! # Containers
//!
//! - [`Discrete`]: step function, the value holds until the next keyframe
//! - [`Continuous`]: linear interpolation between neighbouring keyframes
//!
//! Both take `&self` for writes so they can live inside shared targets that
//! the event loop only references. Every setter returns the time at which the
//! curve changed, which is what the event loop needs to invalidate the events
//! that depend on it.
//!
//! ```ignore
//! let hp = Discrete::new(100);
//! hp.set_last(Time::from_int(5), 80);
//!
//! assert_eq!(hp.get(Time::from_int(4)), 100);
//! assert_eq!(hp.get(Time::from_int(5)), 80);
//! ```

mod continuous;
mod discrete;
mod keyframe;
mod time;

pub use continuous::{Continuous, Interpolate};
pub use discrete::Discrete;
pub use keyframe::{Keyframe, KeyframeContainer};
pub use time::Time;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Continuous, Discrete, Interpolate, Time};
}
