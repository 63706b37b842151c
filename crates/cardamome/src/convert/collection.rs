//! Lists and maps: the bracketed text grammar and element-wise conversion
//!
//! Text lists look like `[a, b, c]` and text maps like `[k1: v1, k2: v2]`.
//! Brackets nest, and `\` escapes the next character so delimiters can
//! appear inside elements.

use super::{Converter, ConverterRegistry, TargetType, TypeHierarchy, TypeKey};
use crate::error::ConversionError;
use crate::value::{Value, ValueMap};

/// Split `text` on `delim` where it appears outside nested brackets.
///
/// Pieces keep their escapes. At most `limit` pieces are produced; the
/// last one holds the remainder.
fn split_top_level(text: &str, delim: char, limit: usize) -> Result<Vec<&str>, String> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unexpected `]` at offset {i}"))?;
            }
            c if c == delim && depth == 0 && pieces.len() + 1 < limit => {
                pieces.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err("unclosed `[`".to_string());
    }
    pieces.push(&text[start..]);
    Ok(pieces)
}

/// Drop one level of `\` escapes
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The content between the outer brackets.
///
/// The `[` opening the text must be closed by an unescaped `]` that is
/// the last character.
fn bracketed(text: &str) -> Result<&str, String> {
    let text = text.trim();
    let not_enclosed = || format!("`{text}` is not enclosed in brackets");
    if !text.starts_with('[') {
        return Err(not_enclosed());
    }

    let mut depth = 0usize;
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return if i + 1 == text.len() {
                        Ok(&text[1..i])
                    } else {
                        Err(format!("unexpected `{}` after the closing `]`", &text[i + 1..]))
                    };
                }
            }
            _ => {}
        }
    }
    Err(not_enclosed())
}

/// Elements destined for another collection keep their escapes for the nested parse
fn leaf_text(piece: &str, target: &TargetType) -> Value {
    let piece = piece.trim();
    if target.element_type().is_some() || target.entry_types().is_some() {
        Value::from(piece)
    } else {
        Value::String(unescape(piece))
    }
}

fn parse_items(text: &str) -> Result<Vec<&str>, String> {
    let inner = bracketed(text)?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inner, ',', usize::MAX)
}

/// `[a, b, c]` to a list
pub struct StringToList;

impl Converter for StringToList {
    fn name(&self) -> &str {
        "string-to-list"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::STRING
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        target.element_type().is_some()
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        let fail = |reason: String| ConversionError::failed(TypeKey::STRING, target, reason);
        let text = value.as_str().ok_or_else(|| fail("not a string".to_string()))?;
        let element = target
            .element_type()
            .ok_or_else(|| fail("not a sequence target".to_string()))?;

        let items = parse_items(text).map_err(fail)?;
        items
            .into_iter()
            .map(|piece| registry.convert(leaf_text(piece, element), element))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List)
    }
}

/// `[k1: v1, k2: v2]` to a map
pub struct StringToMap;

impl Converter for StringToMap {
    fn name(&self) -> &str {
        "string-to-map"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::STRING
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        target.entry_types().is_some()
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        let fail = |reason: String| ConversionError::failed(TypeKey::STRING, target, reason);
        let text = value.as_str().ok_or_else(|| fail("not a string".to_string()))?;
        let (key_type, value_type) = target
            .entry_types()
            .ok_or_else(|| fail("not a map target".to_string()))?;

        let mut map = ValueMap::new();
        for entry in parse_items(text).map_err(fail)? {
            let parts = split_top_level(entry, ':', 2).map_err(fail)?;
            let [key, val] = parts.as_slice() else {
                return Err(fail(format!("entry `{}` has no `:`", entry.trim())));
            };
            let key = registry.convert(leaf_text(key, key_type), key_type)?;
            let val = registry.convert(leaf_text(val, value_type), value_type)?;
            map.insert(key, val);
        }
        Ok(Value::Map(map))
    }
}

/// Converts list elements to a parameterized element type
pub struct SequenceConverter;

impl Converter for SequenceConverter {
    fn name(&self) -> &str {
        "sequence"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::LIST
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        matches!(target, TargetType::List(_))
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        convert_elements(value, target, registry)
    }
}

/// Adapts a fixed host array to a list
pub struct ArrayToSequence;

impl Converter for ArrayToSequence {
    fn name(&self) -> &str {
        "array-to-sequence"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::ARRAY
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        target.element_type().is_some()
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        convert_elements(value, target, registry)
    }
}

fn convert_elements(
    value: Value,
    target: &TargetType,
    registry: &ConverterRegistry,
) -> Result<Value, ConversionError> {
    let source_type = value.type_key();
    let element = target
        .element_type()
        .ok_or_else(|| ConversionError::failed(source_type.clone(), target, "not a sequence target"))?;
    let (Value::List(items) | Value::Array(items)) = value else {
        return Err(ConversionError::failed(source_type, target, "not a sequence"));
    };
    items
        .into_iter()
        .map(|item| registry.convert(item, element))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

/// Converts map keys and values to parameterized types
pub struct MapConverter;

impl Converter for MapConverter {
    fn name(&self) -> &str {
        "map"
    }

    fn source_type(&self) -> TypeKey {
        TypeKey::MAP
    }

    fn supports_target_type(&self, target: &TargetType, _types: &TypeHierarchy) -> bool {
        matches!(target, TargetType::Map(..))
    }

    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError> {
        let Some((key_type, value_type)) = target.entry_types() else {
            return Err(ConversionError::failed(TypeKey::MAP, target, "not a map target"));
        };
        let Value::Map(entries) = value else {
            return Err(ConversionError::failed(value.type_key(), target, "not a map"));
        };
        let mut map = ValueMap::new();
        for (key, val) in entries {
            map.insert(
                registry.convert(key, key_type)?,
                registry.convert(val, value_type)?,
            );
        }
        Ok(Value::Map(map))
    }
}
