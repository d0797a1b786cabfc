//! Slots for stages implemented outside the core.
//!
//! Type inference, the optimization stages and the remaining tree
//! rewrites are owned by other crates. They plug in through a
//! [`PassProvider`]; without one every such slot holds a [`Passthrough`].

use std::fmt;

use super::{PipelineValue, StageId, Transform};
use crate::context::Context;
use crate::diagnostic::Diagnostics;
use crate::error::StageError;

pub trait PassProvider: fmt::Debug {
    /// Implementation of the external stage `id`, or `None` to leave the
    /// slot as a skip marker.
    fn provide(&self, id: StageId) -> Option<Box<dyn Transform>>;
}

/// Fills every external slot with an identity transform.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPasses;

impl PassProvider for DefaultPasses {
    fn provide(&self, id: StageId) -> Option<Box<dyn Transform>> {
        Some(Box::new(Passthrough(id)))
    }
}

/// Leaves the value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passthrough(pub StageId);

impl Transform for Passthrough {
    fn id(&self) -> StageId {
        self.0
    }

    fn apply(
        &self,
        _ctx: &mut Context,
        _diag: &mut Diagnostics,
        _data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        Ok(())
    }
}
