//! Error types for the maXTouch driver.

use core::fmt::{self, Debug};

use crate::object::ObjectType;

/// The main error type for the maXTouch driver.
pub enum Error<TBUSERR> {
    /// A register read or write on the bus failed.
    Bus(TBUSERR),
    /// The operation needs an object that the object table did not list.
    ObjectAbsent(ObjectType),
    /// A reporting resolution that cannot be represented in the range registers.
    InvalidResolution,
}

impl<TBUSERR: Debug> Debug for Error<TBUSERR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(err) => write!(f, "Bus({err:?})"),
            Self::ObjectAbsent(object) => write!(f, "ObjectAbsent({object:?})"),
            Self::InvalidResolution => write!(f, "InvalidResolution"),
        }
    }
}

impl<TBUSERR> From<TBUSERR> for Error<TBUSERR> {
    fn from(bus_err: TBUSERR) -> Self {
        Error::Bus(bus_err)
    }
}
