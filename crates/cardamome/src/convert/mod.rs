//! Type-directed value conversion
//!
//! A [`ConverterRegistry`] owns the type hierarchy and an ordered list of
//! converters. Conversion picks the converter whose declared source type
//! is closest to the value's runtime type among those that support the
//! requested target.

mod collection;
mod numeric;
mod text;
mod types;

pub use collection::{ArrayToSequence, MapConverter, SequenceConverter, StringToList, StringToMap};
pub use numeric::{NumberConverter, StringToNumber};
pub use text::{ObjectToString, StringToBoolean, StringToEnum};
pub use types::{TargetType, TypeDef, TypeHierarchy, TypeKey};

use crate::error::ConversionError;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Converts values of one source type to the targets it supports
pub trait Converter: Send + Sync {
    fn name(&self) -> &str;

    /// Values whose runtime type descends from this are candidates
    fn source_type(&self) -> TypeKey;

    fn supports_target_type(&self, target: &TargetType, types: &TypeHierarchy) -> bool;

    /// Convert `value`; nested element conversions go back through `registry`
    fn convert(
        &self,
        value: Value,
        target: &TargetType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConversionError>;
}

/// Registered converters plus the type hierarchy they are resolved against
#[derive(Clone)]
pub struct ConverterRegistry {
    types: TypeHierarchy,
    converters: Vec<Arc<dyn Converter>>,
    strict: bool,
}

impl ConverterRegistry {
    /// An empty registry over the built-in type hierarchy
    pub fn new() -> Self {
        Self {
            types: TypeHierarchy::with_builtins(),
            converters: Vec::new(),
            strict: false,
        }
    }

    /// The built-in converters, registered in priority order
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(NumberConverter);
        registry.register(StringToNumber);
        registry.register(StringToBoolean);
        registry.register(StringToEnum);
        registry.register(StringToList);
        registry.register(StringToMap);
        registry.register(SequenceConverter);
        registry.register(ArrayToSequence);
        registry.register(MapConverter);
        registry.register(ObjectToString);
        registry
    }

    pub fn register(&mut self, converter: impl Converter + 'static) {
        trace!(converter = converter.name(), source = %converter.source_type(), "registered converter");
        self.converters.push(Arc::new(converter));
    }

    pub fn register_type(&mut self, key: TypeKey, def: TypeDef) {
        self.types.register(key, def);
    }

    /// Register an enumeration type with its constants
    pub fn register_enum<I, S>(&mut self, key: TypeKey, constants: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.register(key, TypeDef::enumeration(constants));
    }

    /// Report equally close candidates as errors instead of taking the first
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn types(&self) -> &TypeHierarchy {
        &self.types
    }

    pub fn convert(&self, value: Value, target: &TargetType) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let source_type = value.type_key();
        match target {
            TargetType::Any => return Ok(value),
            TargetType::Type(key) if self.types.is_instance(&source_type, key) => {
                return Ok(value);
            }
            _ => {}
        }

        let converter = self.find_converter(&source_type, target)?;
        trace!(
            converter = converter.name(),
            source = %source_type,
            %target,
            "converting"
        );
        converter.convert(value, target, self)
    }

    /// The closest converter for `source_type`, ties broken by registration order
    pub fn find_converter(
        &self,
        source_type: &TypeKey,
        target: &TargetType,
    ) -> Result<&dyn Converter, ConversionError> {
        let mut best: Vec<&dyn Converter> = Vec::new();
        let mut best_distance = usize::MAX;

        for converter in &self.converters {
            if !converter.supports_target_type(target, &self.types) {
                continue;
            }
            let Some(distance) = self.types.distance(source_type, &converter.source_type())
            else {
                continue;
            };
            if distance < best_distance {
                best_distance = distance;
                best.clear();
            }
            if distance == best_distance {
                best.push(converter.as_ref());
            }
        }

        match best.as_slice() {
            [] => Err(ConversionError::NoConverter {
                source_type: source_type.clone(),
                target: target.clone(),
            }),
            [only] => Ok(*only),
            [first, ..] => {
                let candidates: Vec<String> = best.iter().map(|c| c.name().to_string()).collect();
                if self.strict {
                    return Err(ConversionError::Ambiguous {
                        source_type: source_type.clone(),
                        target: target.clone(),
                        candidates,
                    });
                }
                debug!(
                    source = %source_type,
                    %target,
                    chosen = first.name(),
                    ?candidates,
                    "converter tie broken by registration order"
                );
                Ok(*first)
            }
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
