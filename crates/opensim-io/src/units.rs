//! Unit conversion between capture units and OpenSim's expected units.

use crate::error::OpenSimIoError;

/// The physical quantity a unit measures. Conversions are only valid within
/// a single quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Length,
    Force,
    Moment,
}

/// Maps a unit label to its quantity and its factor to the SI base unit.
fn classify(unit: &str) -> Option<(Quantity, f64)> {
    match unit {
        "m" => Some((Quantity::Length, 1.0)),
        "cm" => Some((Quantity::Length, 0.01)),
        "mm" => Some((Quantity::Length, 0.001)),
        "in" => Some((Quantity::Length, 0.0254)),
        "ft" => Some((Quantity::Length, 0.3048)),
        "N" => Some((Quantity::Force, 1.0)),
        "Nm" => Some((Quantity::Moment, 1.0)),
        "Ncm" => Some((Quantity::Moment, 0.01)),
        "Nmm" => Some((Quantity::Moment, 0.001)),
        _ => None,
    }
}

/// The multiplicative factor that converts values in `from` units to `to`
/// units. Fails on unknown units and on conversions across quantities.
pub fn conversion_factor(from: &str, to: &str) -> Result<f64, OpenSimIoError> {
    let (from_q, from_f) =
        classify(from).ok_or_else(|| OpenSimIoError::UnknownUnit(from.to_string()))?;
    let (to_q, to_f) = classify(to).ok_or_else(|| OpenSimIoError::UnknownUnit(to.to_string()))?;
    if from_q != to_q {
        return Err(OpenSimIoError::IncompatibleUnits(
            from.to_string(),
            to.to_string(),
        ));
    }
    Ok(from_f / to_f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_factors() {
        assert_eq!(conversion_factor("mm", "m").unwrap(), 0.001);
        assert_eq!(conversion_factor("m", "mm").unwrap(), 1000.0);
        assert_eq!(conversion_factor("cm", "cm").unwrap(), 1.0);
        assert!((conversion_factor("in", "m").unwrap() - 0.0254).abs() < 1e-12);
    }

    #[test]
    fn moment_factors() {
        assert_eq!(conversion_factor("Nmm", "Nm").unwrap(), 0.001);
    }

    #[test]
    fn rejects_unknown_and_mixed_units() {
        assert!(matches!(
            conversion_factor("furlong", "m"),
            Err(OpenSimIoError::UnknownUnit(_))
        ));
        assert!(matches!(
            conversion_factor("mm", "N"),
            Err(OpenSimIoError::IncompatibleUnits(_, _))
        ));
    }
}
