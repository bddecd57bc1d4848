/*! Virtual time for timer simulation.

The mitigation machinery can run against the wall clock (with the `std` thread timer) or against
a simulated clock. The simulated clock counts abstract milliseconds:

 - [Instant] is a point on the simulated clock.
 - [Expiration] is a timer deadline, or none.
 - [Duration] is the standard library duration, used for intervals in both modes.

[Instant]: struct.Instant.html
[Expiration]: enum.Expiration.html
[Duration]: https://doc.rust-lang.org/core/time/struct.Duration.html
*/
use core::{cmp, fmt, ops};
pub use core::time::Duration;

/// A point in virtual time.
///
/// Wraps a number of milliseconds since an arbitrary origin, typically the start of a
/// simulation. Only differences between instants carry meaning.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant {
    millis: i64,
}

/// The deadline of a timer, inversion of `Option`.
///
/// Orders `Never` after every instant so that the earliest of several deadlines is a `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// The timer fires at this instant.
    When(Instant),
    /// The timer is not armed.
    Never,
}

use Expiration::{When, Never};

impl Instant {
    /// The origin of virtual time.
    pub const ZERO: Instant = Instant { millis: 0 };

    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// The total number of milliseconds since the origin.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }
}

impl Expiration {
    /// Check if the deadline has been reached at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match self {
            When(deadline) => *deadline <= now,
            Never => false,
        }
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.millis / 1000, self.millis % 1000)
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis + rhs.as_millis() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.millis += rhs.as_millis() as i64;
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl cmp::PartialOrd<Self> for Expiration {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Expiration {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (*self, *other) {
            (Never, Never) => cmp::Ordering::Equal,
            (Never, When(_)) => cmp::Ordering::Greater,
            (When(_), Never) => cmp::Ordering::Less,
            (When(ref a), When(ref b)) => a.cmp(b),
        }
    }
}
