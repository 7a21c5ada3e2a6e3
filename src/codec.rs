//! Pure byte-level encoding of set-current values and decoding of field replies.
//!
//! The two sign bytes use opposite conventions: a current sign of `0x01` means
//! positive while a field sign of `0x01` means negative.

use crate::config::Calibration;
use crate::constants::*;
use crate::error::{MagnetError, Result};
use crate::types::{CurrentCommand, FieldReading, FieldSign};

/// Maps currents in amps onto the 4-byte set-value payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentEncoder {
    calibration: Calibration,
}

impl CurrentEncoder {
    pub fn new(calibration: Calibration) -> Self {
        CurrentEncoder { calibration }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn encode(&self, amps: f64) -> Result<CurrentCommand> {
        encode_current(amps, &self.calibration)
    }
}

/// Encode `amps` as `[magHi, magLo, 0x00, sign]`.
///
/// Fails with [`MagnetError::EncodingRange`] instead of clamping when the
/// scaled magnitude does not fit in 16 bits or exceeds the calibration limit.
pub fn encode_current(amps: f64, calibration: &Calibration) -> Result<CurrentCommand> {
    if !amps.is_finite() {
        return Err(range_error(amps, "current must be finite".to_string()));
    }
    if let Some(max) = calibration.max_amps {
        if amps.abs() > max {
            return Err(range_error(amps, format!("exceeds limit of {max} A")));
        }
    }

    let scaled = (calibration.offset_counts + calibration.counts_per_amp * amps.abs()).round();
    if !(0.0..=f64::from(u16::MAX)).contains(&scaled) {
        return Err(range_error(
            amps,
            format!("scaled magnitude {scaled} outside 0..=65535"),
        ));
    }

    let [hi, lo] = (scaled as u16).to_be_bytes();
    let sign = if amps >= 0.0 {
        CURRENT_SIGN_POSITIVE
    } else {
        CURRENT_SIGN_NEGATIVE
    };

    Ok(CurrentCommand {
        amps,
        bytes: [hi, lo, 0x00, sign],
    })
}

fn range_error(amps: f64, reason: String) -> MagnetError {
    MagnetError::EncodingRange { amps, reason }
}

/// Decode a `[magHi, magLo, sign]` field reply.
pub fn decode_field(bytes: &[u8]) -> Result<FieldReading> {
    let raw: [u8; FIELD_REPLY_LEN] = bytes.try_into().map_err(|_| malformed(bytes))?;

    let sign = match raw[2] {
        FIELD_SIGN_POSITIVE => FieldSign::Positive,
        FIELD_SIGN_NEGATIVE => FieldSign::Negative,
        _ => return Err(malformed(bytes)),
    };
    let counts = u16::from_be_bytes([raw[0], raw[1]]);

    Ok(FieldReading {
        raw,
        magnitude_mt: f64::from(counts) / FIELD_COUNTS_PER_MT,
        sign,
    })
}

fn malformed(bytes: &[u8]) -> MagnetError {
    MagnetError::MalformedResponse {
        expected: "3-byte field reply [magHi, magLo, sign 0x00|0x01]".to_string(),
        actual: bytes.to_vec(),
    }
}

/// Format bytes as space-separated hex for logging
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured() -> Calibration {
        // Fits the 0.1 A and 4.0 A captures exactly
        Calibration {
            counts_per_amp: 324.0,
            offset_counts: 3.0,
            max_amps: None,
        }
    }

    #[test]
    fn test_encode_zero() {
        let command = encode_current(0.0, &Calibration::default()).unwrap();
        assert_eq!(command.bytes, [0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_sign_byte() {
        let encoder = CurrentEncoder::new(Calibration::default());
        assert_eq!(encoder.encode(1.0).unwrap().bytes[3], 0x01);
        assert_eq!(encoder.encode(-1.0).unwrap().bytes[3], 0x00);
        assert_eq!(encoder.encode(1.0).unwrap().bytes[2], 0x00);
        assert_eq!(
            encoder.encode(1.0).unwrap().magnitude(),
            encoder.encode(-1.0).unwrap().magnitude()
        );
    }

    #[test]
    fn test_encode_default_calibration() {
        let command = encode_current(4.0, &Calibration::default()).unwrap();
        // round(1264 / 3.9 * 4.0) = round(1296.41)
        assert_eq!(command.magnitude(), 1296);
        assert_eq!(command.bytes, [0x05, 0x10, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_matches_captures() {
        let calibration = captured();
        assert_eq!(encode_current(4.0, &calibration).unwrap().bytes, [0x05, 0x13, 0x00, 0x01]);
        assert_eq!(encode_current(-4.0, &calibration).unwrap().bytes, [0x05, 0x13, 0x00, 0x00]);
        assert_eq!(encode_current(-0.1, &calibration).unwrap().bytes, [0x00, 0x23, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_max_magnitude() {
        let calibration = Calibration {
            counts_per_amp: 1.0,
            offset_counts: 0.0,
            max_amps: None,
        };
        let command = encode_current(65535.0, &calibration).unwrap();
        assert_eq!(command.bytes, [0xFF, 0xFF, 0x00, 0x01]);

        let err = encode_current(65536.0, &calibration).unwrap_err();
        assert!(matches!(err, MagnetError::EncodingRange { .. }));
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        let calibration = Calibration::default();
        assert!(matches!(
            encode_current(1000.0, &calibration),
            Err(MagnetError::EncodingRange { .. })
        ));
        assert!(matches!(
            encode_current(f64::NAN, &calibration),
            Err(MagnetError::EncodingRange { .. })
        ));
        assert!(matches!(
            encode_current(f64::NEG_INFINITY, &calibration),
            Err(MagnetError::EncodingRange { .. })
        ));

        // A negative offset that drives small currents below zero counts
        let offset = Calibration {
            offset_counts: -10.0,
            ..Calibration::default()
        };
        assert!(encode_current(0.0, &offset).is_err());
    }

    #[test]
    fn test_encode_respects_limit() {
        let calibration = Calibration::default().with_max_amps(4.0);
        assert!(encode_current(-4.0, &calibration).is_ok());
        assert!(matches!(
            encode_current(-4.01, &calibration),
            Err(MagnetError::EncodingRange { .. })
        ));
    }

    #[test]
    fn test_decode_sign() {
        assert_eq!(decode_field(&[0x00, 0x0A, 0x00]).unwrap().value_mt(), 1.0);
        assert_eq!(decode_field(&[0x00, 0x0A, 0x01]).unwrap().value_mt(), -1.0);
    }

    #[test]
    fn test_decode_zero_either_sign() {
        for sign in [0x00, 0x01] {
            let value = decode_field(&[0x00, 0x00, sign]).unwrap().value_mt();
            assert_eq!(value, 0.0);
            assert!(!value.is_nan());
        }
    }

    #[test]
    fn test_decode_max_magnitude() {
        let reading = decode_field(&[0xFF, 0xFF, 0x01]).unwrap();
        assert_eq!(reading.magnitude_mt, 6553.5);
        assert_eq!(reading.value_mt(), -6553.5);
        assert_eq!(reading.raw, [0xFF, 0xFF, 0x01]);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let bytes = [0x12, 0x34, 0x00];
        let first = decode_field(&bytes).unwrap();
        for _ in 0..10 {
            assert_eq!(decode_field(&bytes).unwrap(), first);
        }
        assert_eq!(first.value_mt(), 466.0);
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        for bytes in [&[][..], &[0x00, 0x0A][..], &[0x00, 0x0A, 0x00, 0x00][..]] {
            match decode_field(bytes) {
                Err(MagnetError::MalformedResponse { actual, .. }) => assert_eq!(actual, bytes),
                other => panic!("expected malformed response, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_decode_rejects_unknown_sign() {
        assert!(matches!(
            decode_field(&[0x00, 0x0A, 0x02]),
            Err(MagnetError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x1E, 0x2C, 0x00]), "1E 2C 00");
        assert_eq!(hex(&[]), "");
    }
}
