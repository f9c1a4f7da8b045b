//! Pointer drag tracking: a press only becomes a drag after the pointer
//! travels past [`DRAG_THRESHOLD_PX`] on either axis.

pub const DRAG_THRESHOLD_PX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState<T> {
    Idle,
    Pending { item: T, origin: (f64, f64) },
    Dragging { item: T },
}

#[derive(Debug, Clone)]
pub struct DragTracker<T> {
    state: DragState<T>,
}

impl<T> Default for DragTracker<T> {
    fn default() -> Self {
        Self {
            state: DragState::Idle,
        }
    }
}

impl<T: Copy> DragTracker<T> {
    pub fn state(&self) -> DragState<T> {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Starts a pending drag. Ignored while another drag is in progress.
    pub fn press(&mut self, item: T, x: f64, y: f64) -> bool {
        if !matches!(self.state, DragState::Idle) {
            return false;
        }
        self.state = DragState::Pending {
            item,
            origin: (x, y),
        };
        true
    }

    /// Skips the threshold, e.g. for keyboard-initiated moves.
    pub fn start(&mut self, item: T) -> bool {
        if self.is_dragging() {
            return false;
        }
        self.state = DragState::Dragging { item };
        true
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) -> bool {
        if let DragState::Pending { item, origin } = self.state {
            if (x - origin.0).abs() > DRAG_THRESHOLD_PX || (y - origin.1).abs() > DRAG_THRESHOLD_PX
            {
                self.state = DragState::Dragging { item };
            }
        }
        self.is_dragging()
    }

    /// Ends the interaction. Yields the dragged item only when the press
    /// had turned into a drag; a plain click yields `None`.
    pub fn release(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging { item } => Some(item),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
#[path = "tests/drag_tests.rs"]
mod tests;
