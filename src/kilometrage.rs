//! Kilometrage is the position of an element along a railway line, as written in the catalog.
//! It uses a comma as decimal separator and can be split in segments joined by `+`,
//! e.g. `5,000+0,150` stands for kilometre `5.150`.

use thiserror::Error;

/// Position along a line, in kilometres.
pub type Kilometrage = f64;

/// Errors when reading a kilometrage.
#[derive(Error, Debug, PartialEq)]
pub enum KilometrageError {
    /// A segment is not a finite number.
    #[error("failed to parse kilometrage `{input}`: `{segment}` is not a number")]
    InvalidSegment {
        /// The whole kilometrage string.
        input: String,
        /// The faulty segment.
        segment: String,
    },
}

/// Converts a catalog kilometrage into a [`Kilometrage`], summing the `+` joined segments.
pub fn parse_kilometrage(input: &str) -> Result<Kilometrage, KilometrageError> {
    input.split('+').try_fold(0., |total, segment| {
        let value = segment
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| KilometrageError::InvalidSegment {
                input: input.to_owned(),
                segment: segment.to_owned(),
            })?;
        Ok(total + value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn simple_values() {
        assert_eq!(parse_kilometrage("1,000"), Ok(1.));
        assert_eq!(parse_kilometrage("2,500"), Ok(2.5));
        assert_eq!(parse_kilometrage("-0,300"), Ok(-0.3));
        assert_eq!(parse_kilometrage(" 12,25 "), Ok(12.25));
    }

    #[test]
    fn segments_are_summed() {
        assert_relative_eq!(parse_kilometrage("5,000+0,150").unwrap(), 5.15);
        assert_relative_eq!(parse_kilometrage("1,0+0,5+0,25").unwrap(), 1.75);
    }

    #[test]
    fn invalid_values() {
        assert_eq!(
            parse_kilometrage("2,abc"),
            Err(KilometrageError::InvalidSegment {
                input: "2,abc".to_owned(),
                segment: "2,abc".to_owned()
            })
        );
        assert_eq!(
            parse_kilometrage("5,000+x"),
            Err(KilometrageError::InvalidSegment {
                input: "5,000+x".to_owned(),
                segment: "x".to_owned()
            })
        );
        assert!(parse_kilometrage("").is_err());
        assert!(parse_kilometrage("1,0+").is_err());
        assert!(parse_kilometrage("inf").is_err());
        assert!(parse_kilometrage("1,2,3").is_err());
    }
}
