//! The `core` library
//!
//! Structural actions, output contributions and a handful of expression
//! functions. Registered by default; see [`EngineConfig::core_library`].
//!
//! [`EngineConfig::core_library`]: crate::EngineConfig::core_library

mod actions;
mod contributions;
mod functions;

use crate::action::{Library, ParameterContract};
use crate::convert::TargetType;

pub use actions::{Call, ForEach, Fragment, If, Include, Out, Set};
pub use contributions::{Catch, Collapse, Mute, Repeat, Trim, When};

/// Id the library is registered under
pub const CORE_LIBRARY: &str = "core";

/// Build the `core` library
pub fn library() -> Library {
    let library = Library::new(CORE_LIBRARY)
        .action(
            "if",
            ParameterContract::new().required("test", TargetType::Any),
            If::new,
        )
        .action(
            "for-each",
            ParameterContract::new()
                .required("items", TargetType::list_of(TargetType::Any))
                .required("var", TargetType::STRING)
                .optional("status", TargetType::STRING),
            ForEach::new,
        )
        .action(
            "set",
            ParameterContract::new()
                .required("name", TargetType::STRING)
                .required("value", TargetType::Any)
                .optional("scope", TargetType::STRING),
            Set::new,
        )
        .action(
            "out",
            ParameterContract::new().required("value", TargetType::Any),
            Out::new,
        )
        .action(
            "fragment",
            ParameterContract::new().required("name", TargetType::STRING),
            Fragment::new,
        )
        .action(
            "call",
            ParameterContract::new()
                .required("name", TargetType::STRING)
                .accept_extra(),
            Call::new,
        )
        .action(
            "include",
            ParameterContract::new()
                .required("template", TargetType::STRING)
                .accept_extra(),
            Include::new,
        )
        .contribution("trim", TargetType::STRING, Trim::new)
        .contribution("collapse", TargetType::I32, Collapse::new)
        .contribution("mute", TargetType::BOOL, Mute::new)
        .contribution("when", TargetType::Any, When::new)
        .contribution("repeat", TargetType::I64, Repeat::new)
        .contribution("catch", TargetType::STRING, Catch::new);
    functions::register(library)
}
