use crate::models::StageState;

/// The record whose stage is being driven.
///
/// The engine reads and writes the stage state and asks the subject to
/// persist itself at most once per mutating call. Storage is the
/// implementor's business.
pub trait Subject {
    fn stage_state(&self) -> &StageState;

    fn stage_state_mut(&mut self) -> &mut StageState;

    /// Persist the current state as one unit of work.
    fn save(&mut self) -> anyhow::Result<()>;
}

impl<T: Subject + ?Sized> Subject for &mut T {
    fn stage_state(&self) -> &StageState {
        (**self).stage_state()
    }

    fn stage_state_mut(&mut self) -> &mut StageState {
        (**self).stage_state_mut()
    }

    fn save(&mut self) -> anyhow::Result<()> {
        (**self).save()
    }
}

impl<T: Subject + ?Sized> Subject for Box<T> {
    fn stage_state(&self) -> &StageState {
        (**self).stage_state()
    }

    fn stage_state_mut(&mut self) -> &mut StageState {
        (**self).stage_state_mut()
    }

    fn save(&mut self) -> anyhow::Result<()> {
        (**self).save()
    }
}
