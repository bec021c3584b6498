//! Per-component lifecycle transitions with their attribute bindings.

use crate::attributes::{AttributeMap, AttributeSpec, Binder, BindingDirection, BindingPhase};
use crate::context::ClusteringContext;
use crate::error::{LingoError, LingoResult};

use super::ProcessingComponent;

/// Position of a request in the fixed lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestState {
    Idle,
    Initialized,
    Processing,
    Completed,
}

impl RequestState {
    /// Moves from `from` to `to`, rejecting any other transition.
    pub(crate) fn advance(&mut self, from: RequestState, to: RequestState) -> LingoResult<()> {
        if *self != from {
            return Err(LingoError::processing(
                "pipeline",
                format!("lifecycle out of order: {to:?} requested while {self:?}"),
            ));
        }
        *self = to;
        Ok(())
    }
}

pub(crate) fn init<C>(
    component: &mut C,
    specs: &[AttributeSpec],
    attributes: &mut AttributeMap,
) -> LingoResult<()>
where
    C: ProcessingComponent + ?Sized,
{
    bind(component, specs, attributes, BindingPhase::Init, BindingDirection::Input)?;
    component.init()?;
    bind(component, specs, attributes, BindingPhase::Init, BindingDirection::Output)
}

pub(crate) fn before_processing<C>(
    component: &mut C,
    specs: &[AttributeSpec],
    attributes: &mut AttributeMap,
) -> LingoResult<()>
where
    C: ProcessingComponent + ?Sized,
{
    bind(
        component,
        specs,
        attributes,
        BindingPhase::Processing,
        BindingDirection::Input,
    )?;
    component.before_processing()
}

pub(crate) fn after_processing<C>(
    component: &mut C,
    specs: &[AttributeSpec],
    attributes: &mut AttributeMap,
    context: &mut ClusteringContext,
) -> LingoResult<()>
where
    C: ProcessingComponent + ?Sized,
{
    component.after_processing(context)?;
    bind(
        component,
        specs,
        attributes,
        BindingPhase::Processing,
        BindingDirection::Output,
    )
}

fn bind<C>(
    component: &mut C,
    specs: &[AttributeSpec],
    attributes: &mut AttributeMap,
    phase: BindingPhase,
    direction: BindingDirection,
) -> LingoResult<()>
where
    C: ProcessingComponent + ?Sized,
{
    let name = component.name().to_string();
    let mut binder = Binder::new(&name, specs, attributes, phase, direction);
    component.bind_attributes(&mut binder)?;
    binder.finish()
}
