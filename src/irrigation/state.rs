use core::fmt;

/// Phase of an irrigation zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrrigationState {
    /// Pump runs in bursts until the soil reaches the upper threshold.
    Watering,
    /// Pump idle until the soil dries down to the lower threshold.
    #[default]
    Draining,
}

impl IrrigationState {
    /// The state this one hands over to.
    pub fn next(self) -> Self {
        match self {
            Self::Watering => Self::Draining,
            Self::Draining => Self::Watering,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Watering => "Watering",
            Self::Draining => "Draining",
        }
    }
}

impl fmt::Display for IrrigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
