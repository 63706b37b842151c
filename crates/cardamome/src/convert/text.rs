//! Conversions between text and scalar values

use super::{Converter, ConverterRegistry, TargetType, TypeHierarchy, TypeKey};
use crate::error::ConversionError;
use crate::value::{EnumValue, Value};

fn text_of<'v>(value: &'v Value, target: &TargetType) -> Result<&'v str, ConversionError> {
    value
        .as_str()
        .ok_or_else(|| ConversionError::failed(value.type_key(), target, "not a string"))
}

/// Case-insensitive `true` / `false`
pub struct StringToBoolean;

impl Converter for StringToBoolean {
    fn name(&self) -> &str {
        "string-to-boolean"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::STRING
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        target.type_key() == Some(&TypeKey::BOOL)
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        _registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        let text = text_of(&value, target)?.trim();
        if text.eq_ignore_ascii_case("true") {
            Ok(Value::Bool(true))
        } else if text.eq_ignore_ascii_case("false") {
            Ok(Value::Bool(false))
        } else {
            Err(ConversionError::failed(
                TypeKey::STRING,
                target,
                format!("`{text}` is neither true nor false"),
            ))
        }
    }
}

/// Text to a constant of a registered enumeration
///
/// Matching ignores case and treats `-` as `_`, so `dark-red` names
/// `DARK_RED`.
pub struct StringToEnum;

fn normalize_constant(text: &str) -> String {
    text.trim().replace('-', "_").to_ascii_uppercase()
}

impl Converter for StringToEnum {
    fn name(&self) -> &str {
        "string-to-enum"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::STRING
    }

    fn supports_target_type(&self, target: &TargetType, types: &TypeHierarchy) -> bool {
        target.type_key().is_some_and(|key| types.is_enum(key))
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        let text = text_of(&value, target)?;
        let fail = |reason: String| ConversionError::failed(TypeKey::STRING, target, reason);
        let key = target
            .type_key()
            .ok_or_else(|| fail("not an enumeration target".to_string()))?;
        let constants = registry
            .types()
            .enum_constants(key)
            .ok_or_else(|| fail(format!("{key} is not an enumeration")))?;

        let wanted = normalize_constant(text);
        constants
            .iter()
            .find(|constant| normalize_constant(constant) == wanted)
            .map(|constant| Value::Enum(EnumValue::new(key.clone(), constant.clone())))
            .ok_or_else(|| {
                fail(format!(
                    "`{text}` is not one of {}",
                    constants.join(", ")
                ))
            })
    }
}

/// Renders any value as text
pub struct ObjectToString;

impl Converter for ObjectToString {
    fn name(&self) -> &str {
        "object-to-string"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::OBJECT
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        matches!(target.type_key(), Some(key) if *key == TypeKey::STRING || *key == TypeKey::TEXT)
    }

    fn convert(
        &self,
        value: Value,
        _target: &TargetType,
        _registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        Ok(Value::String(value.render_to_string()))
    }
}
