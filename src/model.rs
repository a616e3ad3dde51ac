use crate::error::{Error, Result};

pub(crate) type State = [f64; 3];

/// Closed integration interval with `start < end`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TimeSpan {
    start: f64,
    end: f64,
}

impl TimeSpan {
    pub(crate) fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(Error::invalid(format!(
                "time span bounds must be finite, got ({start}, {end})"
            )));
        }
        if start >= end {
            return Err(Error::invalid(format!(
                "time span must satisfy start < end, got ({start}, {end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub(crate) fn start(&self) -> f64 {
        self.start
    }

    pub(crate) fn end(&self) -> f64 {
        self.end
    }

    pub(crate) fn len(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub(crate) fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl TryFrom<i64> for Axis {
    type Error = Error;

    fn try_from(i: i64) -> Result<Self> {
        match i {
            0 => Ok(Axis::X),
            1 => Ok(Axis::Y),
            2 => Ok(Axis::Z),
            _ => Err(Error::invalid(format!(
                "coordinate index must be 0, 1 or 2, got {i}"
            ))),
        }
    }
}
