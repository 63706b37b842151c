//! Numeric widening, narrowing and parsing

use super::{Converter, ConverterRegistry, TargetType, TypeHierarchy, TypeKey};
use crate::error::ConversionError;
use crate::value::Value;
use bigdecimal::{BigDecimal, ToPrimitive};
use num_bigint::BigInt;
use std::str::FromStr;

/// Intermediate form every numeric value passes through
enum Numeric {
    Int(i128),
    Big(BigInt),
    Float(f64),
    Decimal(BigDecimal),
}

impl Numeric {
    fn of(value: &Value) -> Option<Self> {
        Some(match value {
            Value::I8(n) => Numeric::Int(i128::from(*n)),
            Value::I16(n) => Numeric::Int(i128::from(*n)),
            Value::I32(n) => Numeric::Int(i128::from(*n)),
            Value::I64(n) => Numeric::Int(i128::from(*n)),
            Value::U8(n) => Numeric::Int(i128::from(*n)),
            Value::U16(n) => Numeric::Int(i128::from(*n)),
            Value::U32(n) => Numeric::Int(i128::from(*n)),
            Value::U64(n) => Numeric::Int(i128::from(*n)),
            Value::F32(f) => Numeric::Float(f64::from(*f)),
            Value::F64(f) => Numeric::Float(*f),
            Value::BigInt(n) => Numeric::Big(n.clone()),
            Value::Decimal(d) => Numeric::Decimal(d.clone()),
            _ => return None,
        })
    }

    /// Integral part, truncated toward zero
    fn to_integer(&self) -> Result<BigInt, String> {
        match self {
            Numeric::Int(n) => Ok(BigInt::from(*n)),
            Numeric::Big(n) => Ok(n.clone()),
            Numeric::Float(f) => {
                let decimal = BigDecimal::try_from(f.trunc())
                    .map_err(|_| format!("{f} has no integral value"))?;
                Ok(integral(&decimal))
            }
            Numeric::Decimal(d) => Ok(integral(d)),
        }
    }

    fn to_f64(&self) -> Result<f64, String> {
        let f = match self {
            Numeric::Int(n) => *n as f64,
            Numeric::Float(f) => *f,
            Numeric::Big(n) => n.to_f64().unwrap_or(f64::NAN),
            Numeric::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
        };
        if f.is_nan() && !matches!(self, Numeric::Float(_)) {
            return Err("value does not fit a floating point number".to_string());
        }
        Ok(f)
    }

    fn to_decimal(&self) -> Result<BigDecimal, String> {
        match self {
            Numeric::Int(n) => Ok(BigDecimal::new(BigInt::from(*n), 0)),
            Numeric::Big(n) => Ok(BigDecimal::new(n.clone(), 0)),
            Numeric::Float(f) => {
                BigDecimal::try_from(*f).map_err(|_| format!("{f} is not a finite number"))
            }
            Numeric::Decimal(d) => Ok(d.clone()),
        }
    }

    fn into_value(self, target: &TypeKey) -> Result<Value, String> {
        macro_rules! narrow {
            ($numeric:expr, $variant:ident, $ty:ty) => {{
                let n = $numeric.to_integer()?;
                n.to_i128()
                    .and_then(|n| <$ty>::try_from(n).ok())
                    .map(Value::$variant)
                    .ok_or_else(|| format!("{n} is out of range for {}", stringify!($ty)))
            }};
        }

        match target.as_str() {
            "i8" => narrow!(self, I8, i8),
            "i16" => narrow!(self, I16, i16),
            "i32" => narrow!(self, I32, i32),
            "i64" => narrow!(self, I64, i64),
            "u8" => narrow!(self, U8, u8),
            "u16" => narrow!(self, U16, u16),
            "u32" => narrow!(self, U32, u32),
            "u64" => narrow!(self, U64, u64),
            "f64" => self.to_f64().map(Value::F64),
            "f32" => {
                let f = self.to_f64()?;
                if f.is_finite() && f.abs() > f64::from(f32::MAX) {
                    return Err(format!("{f} is out of range for f32"));
                }
                Ok(Value::F32(f as f32))
            }
            "bigint" => self.to_integer().map(Value::BigInt),
            "decimal" => self.to_decimal().map(Value::Decimal),
            other => Err(format!("{other} is not a numeric type")),
        }
    }
}

fn integral(decimal: &BigDecimal) -> BigInt {
    // with_scale(0) drops the fraction without rounding
    decimal.with_scale(0).as_bigint_and_exponent().0
}

fn numeric_target(target: &TargetType) -> Option<&TypeKey> {
    target.type_key().filter(|key| key.is_numeric())
}

/// Widening and checked narrowing between all numeric types
pub struct NumberConverter;

impl Converter for NumberConverter {
    fn name(&self) -> &str {
        "number"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::NUMBER
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        numeric_target(target).is_some()
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        _registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        let source_type = value.type_key();
        let fail = |reason: String| ConversionError::failed(source_type.clone(), target, reason);
        let numeric = Numeric::of(&value).ok_or_else(|| fail("not a number".to_string()))?;
        let key = numeric_target(target).ok_or_else(|| fail("not a numeric target".to_string()))?;
        numeric.into_value(key).map_err(fail)
    }
}

/// Parses text into any numeric type
pub struct StringToNumber;

impl Converter for StringToNumber {
    fn name(&self) -> &str {
        "string-to-number"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::STRING
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        numeric_target(target).is_some()
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        _registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        let fail = |reason: String| ConversionError::failed(TypeKey::STRING, target, reason);
        let text = value
            .as_str()
            .ok_or_else(|| fail("not a string".to_string()))?
            .trim();
        let key = numeric_target(target).ok_or_else(|| fail("not a numeric target".to_string()))?;

        let numeric = match key.as_str() {
            "f32" | "f64" => f64::from_str(text).map(Numeric::Float).ok(),
            "decimal" => BigDecimal::from_str(text).map(Numeric::Decimal).ok(),
            _ => BigInt::from_str(text).map(Numeric::Big).ok(),
        }
        .ok_or_else(|| fail(format!("`{text}` is not a valid {key}")))?;

        numeric.into_value(key).map_err(fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(value: Value, key: TypeKey) -> Result<Value, ConversionError> {
        ConverterRegistry::with_defaults().convert(value, &TargetType::of(key))
    }

    #[test]
    fn test_widening() {
        assert_eq!(convert(Value::I8(-4), TypeKey::I64).unwrap(), Value::I64(-4));
        assert_eq!(convert(Value::U32(7), TypeKey::F64).unwrap(), Value::F64(7.0));
        assert_eq!(
            convert(Value::I64(12), TypeKey::BIG_INT).unwrap(),
            Value::BigInt(BigInt::from(12))
        );
        assert_eq!(
            convert(Value::I32(3), TypeKey::DECIMAL).unwrap(),
            Value::Decimal(BigDecimal::from(3))
        );
    }

    #[test]
    fn test_checked_narrowing() {
        assert_eq!(convert(Value::I64(100), TypeKey::I8).unwrap(), Value::I8(100));
        assert!(matches!(
            convert(Value::I64(300), TypeKey::I8),
            Err(ConversionError::Failed { .. })
        ));
        assert!(convert(Value::I32(-1), TypeKey::U16).is_err());
        assert_eq!(convert(Value::F64(-2.9), TypeKey::I32).unwrap(), Value::I32(-2));
        assert!(convert(Value::F64(f64::INFINITY), TypeKey::I32).is_err());
        assert!(convert(Value::F64(1e300), TypeKey::F32).is_err());
    }

    #[test]
    fn test_big_values() {
        let huge = BigInt::from_str("123456789012345678901234567890").unwrap();
        assert!(convert(Value::BigInt(huge.clone()), TypeKey::I64).is_err());
        let decimal = BigDecimal::from_str("42.75").unwrap();
        assert_eq!(convert(Value::Decimal(decimal), TypeKey::U8).unwrap(), Value::U8(42));
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(convert(Value::from(" 42 "), TypeKey::I32).unwrap(), Value::I32(42));
        assert_eq!(convert(Value::from("2.5"), TypeKey::F64).unwrap(), Value::F64(2.5));
        assert_eq!(
            convert(Value::from("0.10"), TypeKey::DECIMAL).unwrap(),
            Value::Decimal(BigDecimal::from_str("0.10").unwrap())
        );
        assert!(convert(Value::from("2.5"), TypeKey::I32).is_err());
        assert!(convert(Value::from("999"), TypeKey::U8).is_err());
        assert!(convert(Value::from("abc"), TypeKey::I64).is_err());
    }
}
