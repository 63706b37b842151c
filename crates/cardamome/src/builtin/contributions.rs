//! Contributions that decorate an action's execution

use super::CORE_LIBRARY;
use crate::action::{
    ActionContext, BoundParameter, Contribution, ContributionInit, Interceptor,
    InterceptorRegistry, Next, PendingInvocation, Phase,
};
use crate::convert::{TargetType, TypeKey};
use crate::error::{ConversionError, ParameterError, Result};
use crate::value::Value;
use crate::writer::{CollapseWriter, MuteWriter, StringWriter, TrimMode, TrimWriter, Writer};
use tracing::debug;

/// Runs the rest of the chain into `writer`, then hands `writer` back
fn capture<W: Writer>(ac: &mut ActionContext<'_, '_>, next: Next<'_>, mut writer: W) -> (W, Result<()>) {
    let result = ac.with_writer(&mut writer, |ac| next.proceed(ac));
    (writer, result)
}

/// Trims whitespace from each line of the action's output
pub struct Trim {
    parameter: BoundParameter,
}

impl Trim {
    pub fn new(init: ContributionInit) -> Result<Self> {
        Ok(Self {
            parameter: init.parameter,
        })
    }
}

impl Contribution for Trim {
    fn contribute(&self, pending: &PendingInvocation<'_>, interceptors: &mut InterceptorRegistry) -> Result<()> {
        let text = pending.resolve(&self.parameter)?.render_to_string();
        let mode = TrimMode::parse(&text).ok_or_else(|| ParameterError::WrongType {
            action: pending.element.qualified_name(),
            name: "trim".to_string(),
            cause: ConversionError::failed(
                TypeKey::STRING,
                &TargetType::STRING,
                format!("`{text}` is not one of leading, trailing, both"),
            ),
        })?;
        interceptors.register(Phase::Execution, TrimOutput { mode });
        Ok(())
    }
}

struct TrimOutput {
    mode: TrimMode,
}

impl Interceptor for TrimOutput {
    fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
        let (trim, result) = capture(ac, next, TrimWriter::new(StringWriter::new(), self.mode, true));
        result?;
        let out = trim.finish()?;
        ac.write_str(out.as_str())
    }
}

/// Collapses runs of blank lines in the action's output
pub struct Collapse {
    parameter: BoundParameter,
}

impl Collapse {
    pub fn new(init: ContributionInit) -> Result<Self> {
        Ok(Self {
            parameter: init.parameter,
        })
    }
}

impl Contribution for Collapse {
    fn contribute(&self, pending: &PendingInvocation<'_>, interceptors: &mut InterceptorRegistry) -> Result<()> {
        let threshold = pending.resolve(&self.parameter)?.as_i64().unwrap_or(2);
        interceptors.register(
            Phase::Execution,
            CollapseOutput {
                threshold: usize::try_from(threshold).unwrap_or(1),
            },
        );
        Ok(())
    }
}

struct CollapseOutput {
    threshold: usize,
}

impl Interceptor for CollapseOutput {
    fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
        let writer = CollapseWriter::new(StringWriter::new(), '\n', self.threshold);
        let (collapse, result) = capture(ac, next, writer);
        result?;
        let out = collapse.finish()?;
        ac.write_str(out.as_str())
    }
}

/// Runs the action but discards its output
pub struct Mute {
    parameter: BoundParameter,
}

impl Mute {
    pub fn new(init: ContributionInit) -> Result<Self> {
        Ok(Self {
            parameter: init.parameter,
        })
    }
}

impl Contribution for Mute {
    fn contribute(&self, pending: &PendingInvocation<'_>, interceptors: &mut InterceptorRegistry) -> Result<()> {
        if pending.resolve(&self.parameter)?.is_truthy() {
            interceptors.register(Phase::Execution, MuteOutput);
        }
        Ok(())
    }
}

struct MuteOutput;

impl Interceptor for MuteOutput {
    fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
        let (_, result) = capture(ac, next, MuteWriter::new(StringWriter::new(), true));
        result
    }
}

/// Skips the action unless its condition is truthy
pub struct When {
    parameter: BoundParameter,
}

impl When {
    pub fn new(init: ContributionInit) -> Result<Self> {
        Ok(Self {
            parameter: init.parameter,
        })
    }
}

impl Contribution for When {
    fn contribute(&self, pending: &PendingInvocation<'_>, interceptors: &mut InterceptorRegistry) -> Result<()> {
        if !pending.resolve(&self.parameter)?.is_truthy() {
            interceptors.register(Phase::Execution, Skip);
        }
        Ok(())
    }
}

struct Skip;

impl Interceptor for Skip {
    fn intercept(&self, _ac: &mut ActionContext<'_, '_>, _next: Next<'_>) -> Result<()> {
        Ok(())
    }
}

/// Executes the action a number of times
pub struct Repeat {
    parameter: BoundParameter,
}

impl Repeat {
    pub fn new(init: ContributionInit) -> Result<Self> {
        Ok(Self {
            parameter: init.parameter,
        })
    }
}

impl Contribution for Repeat {
    fn contribute(&self, pending: &PendingInvocation<'_>, interceptors: &mut InterceptorRegistry) -> Result<()> {
        if pending.is_action(CORE_LIBRARY, "fragment") {
            return Err(pending
                .unsupported("repeat", "a fragment can only be defined once")
                .into());
        }
        let times = pending.resolve(&self.parameter)?.as_i64().unwrap_or(0).max(0);
        interceptors.register(Phase::Execution, RepeatExecution { times });
        Ok(())
    }
}

struct RepeatExecution {
    times: i64,
}

impl Interceptor for RepeatExecution {
    fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
        for _ in 0..self.times {
            next.proceed(ac)?;
        }
        Ok(())
    }
}

/// Swallows a failure of the action, storing its message in a variable.
///
/// Output written before the failure is discarded.
pub struct Catch {
    parameter: BoundParameter,
}

impl Catch {
    pub fn new(init: ContributionInit) -> Result<Self> {
        Ok(Self {
            parameter: init.parameter,
        })
    }
}

impl Contribution for Catch {
    fn contribute(&self, pending: &PendingInvocation<'_>, interceptors: &mut InterceptorRegistry) -> Result<()> {
        let var = pending.resolve(&self.parameter)?.render_to_string();
        interceptors.register(Phase::Execution, CatchFailure { var });
        Ok(())
    }
}

struct CatchFailure {
    var: String,
}

impl Interceptor for CatchFailure {
    fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
        let (out, result) = capture(ac, next, StringWriter::new());
        match result {
            Ok(()) => ac.write_str(out.as_str()),
            Err(err) => {
                let message = err.root().to_string();
                debug!(var = %self.var, error = %message, "caught failure");
                ac.context_mut().set_variable(self.var.clone(), Value::String(message));
                Ok(())
            }
        }
    }
}
