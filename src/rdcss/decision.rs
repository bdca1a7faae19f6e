use core::fmt::{Display, Formatter};

use crate::err::DecisionOutOfBoundsError;

/// What an installed descriptor resolves to.
///
/// A descriptor starts out `Undecided`. The first resolver to read the control address moves it
/// to either `Commit` or `RollBack`, and every other resolver adopts that choice. A decision never
/// changes again once made.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Nobody has read the control address on behalf of this descriptor yet.
    Undecided = 0,
    /// The control address held the expected control value; the data address gets the new value.
    Commit = 1,
    /// The control address did not hold the expected control value; the data address gets its
    /// expected value back.
    RollBack = 2,
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl TryFrom<usize> for Decision {
    type Error = DecisionOutOfBoundsError;

    fn try_from(decision: usize) -> Result<Self, DecisionOutOfBoundsError> {
        match decision {
            i if i == Decision::Undecided as usize => Ok(Decision::Undecided),
            i if i == Decision::Commit as usize => Ok(Decision::Commit),
            i if i == Decision::RollBack as usize => Ok(Decision::RollBack),
            i => Err(DecisionOutOfBoundsError(i)),
        }
    }
}
