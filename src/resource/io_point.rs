//! Input and Output specifics.

use crate::types::DataType;

/// Fixed-type state carried by Inputs and Outputs.
///
/// Units live on the shared core because Placeholders and Observations
/// carry them too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoPoint {
    /// Decided at creation time, never changes
    pub data_type: DataType,
    /// Outputs are mandatory until the owner marks them optional
    pub mandatory: bool,
}

impl IoPoint {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            mandatory: true,
        }
    }

    /// True if `units` can be delivered to a point with `own` units.
    ///
    /// An empty string on either side means "unspecified" and matches anything.
    pub fn units_match(own: &str, units: &str) -> bool {
        own.is_empty() || units.is_empty() || own == units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_mandatory() {
        let io = IoPoint::new(DataType::Numeric);
        assert!(io.mandatory);
        assert_eq!(io.data_type, DataType::Numeric);
    }

    #[test]
    fn test_units_match() {
        assert!(IoPoint::units_match("degC", "degC"));
        assert!(IoPoint::units_match("", "degC"));
        assert!(IoPoint::units_match("degC", ""));
        assert!(!IoPoint::units_match("degC", "degF"));
    }
}
