//! Drag and pinch recognition, and the router that applies recognized
//! gestures to the viewport.
//!
//! Both recognizers run independently on every event. Drag engages only
//! for exactly one active pointer; a second finger touching down drops the
//! drag so it can hand off to pinch without the two fighting over the same
//! pointer. All recognizer state lives in explicit fields so a gesture can
//! be replayed and inspected in isolation.

use crate::input::{GestureConfig, PointerAction, PointerEvent};
use crate::math::Vec2;
use crate::viewport::ViewportState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Start,
    Move,
    None,
}

/// Single-pointer drag state machine.
#[derive(Debug, Default)]
pub struct DragRecognizer {
    config: GestureConfig,
    active: bool,
    pointer: Vec2,
}

impl DragRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            active: false,
            pointer: Vec2::ZERO,
        }
    }

    /// Runs one event through the state machine. The position returned by
    /// [`pointer`](Self::pointer) is only valid after `Start` or `Move`.
    pub fn detect(&mut self, event: &PointerEvent) -> GesturePhase {
        if event.count() != 1 {
            self.active = false;
            return GesturePhase::None;
        }
        let pos = event.pointers[0].pos;
        match event.action {
            PointerAction::Down => {
                self.active = true;
                self.pointer = pos;
                GesturePhase::Start
            }
            PointerAction::Move if self.active => {
                // Jitter below the touch slop keeps the last position.
                if (pos - self.pointer).length() >= self.config.touch_slop {
                    self.pointer = pos;
                }
                GesturePhase::Move
            }
            _ => {
                self.active = false;
                GesturePhase::None
            }
        }
    }

    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }
}

/// Two-pointer pinch state machine. Positions are reported in stable slot
/// order so "pointer A" keeps meaning the same finger across calls.
#[derive(Debug, Default)]
pub struct PinchRecognizer {
    config: GestureConfig,
    active: bool,
    pointers: [Vec2; 2],
}

impl PinchRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            active: false,
            pointers: [Vec2::ZERO; 2],
        }
    }

    pub fn detect(&mut self, event: &PointerEvent) -> GesturePhase {
        if event.count() != 2 {
            self.active = false;
            return GesturePhase::None;
        }
        match event.action {
            PointerAction::PointerDown => {
                self.active = true;
                self.pointers = [event.pointers[0].pos, event.pointers[1].pos];
                GesturePhase::Start
            }
            PointerAction::Move if self.active => {
                for slot in 0..2 {
                    let pos = event.pointers[slot].pos;
                    if (pos - self.pointers[slot]).length() >= self.config.touch_slop {
                        self.pointers[slot] = pos;
                    }
                }
                GesturePhase::Move
            }
            _ => {
                self.active = false;
                GesturePhase::None
            }
        }
    }

    pub fn pointers(&self) -> (Vec2, Vec2) {
        (self.pointers[0], self.pointers[1])
    }
}

/// Feeds each event to both recognizers and turns their transitions into
/// viewport mutations. Raw positions are converted to render space the
/// moment they leave a recognizer; all transform math happens there.
#[derive(Debug, Default)]
pub struct GestureRouter {
    drag: DragRecognizer,
    pinch: PinchRecognizer,
    drag_anchor: Vec2,
    pinch_anchors: (Vec2, Vec2),
}

impl GestureRouter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            drag: DragRecognizer::new(config),
            pinch: PinchRecognizer::new(config),
            drag_anchor: Vec2::ZERO,
            pinch_anchors: (Vec2::ZERO, Vec2::ZERO),
        }
    }

    pub fn handle(&mut self, state: &mut ViewportState, event: &PointerEvent) {
        match self.drag.detect(event) {
            GesturePhase::Start => {
                self.drag_anchor = state.to_render_space(self.drag.pointer());
            }
            GesturePhase::Move => {
                let pos = state.to_render_space(self.drag.pointer());
                state.pan(self.drag_anchor, pos);
                self.drag_anchor = pos;
            }
            GesturePhase::None => {
                self.drag_anchor = Vec2::ZERO;
            }
        }

        match self.pinch.detect(event) {
            GesturePhase::Start => {
                let (a, b) = self.pinch.pointers();
                self.pinch_anchors = (state.to_render_space(a), state.to_render_space(b));
            }
            GesturePhase::Move => {
                let (a, b) = self.pinch.pointers();
                let current = (state.to_render_space(a), state.to_render_space(b));
                state.pinch(self.pinch_anchors, current);
                self.pinch_anchors = current;
            }
            GesturePhase::None => {
                self.pinch_anchors = (Vec2::ZERO, Vec2::ZERO);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Pointer;

    fn ev(action: PointerAction, pointers: &[(u64, f32, f32)]) -> PointerEvent {
        PointerEvent {
            action,
            pointers: pointers
                .iter()
                .map(|&(id, x, y)| Pointer {
                    id,
                    pos: Vec2::new(x, y),
                })
                .collect(),
        }
    }

    fn state(width: u32, height: u32) -> ViewportState {
        let mut s = ViewportState::default();
        s.set_surface_size(width, height);
        s
    }

    #[test]
    fn drag_starts_on_primary_down_and_tracks_moves() {
        let mut drag = DragRecognizer::default();

        let phase = drag.detect(&ev(PointerAction::Down, &[(1, 10.0, 20.0)]));
        assert_eq!(phase, GesturePhase::Start);
        assert_eq!(drag.pointer(), Vec2::new(10.0, 20.0));

        let phase = drag.detect(&ev(PointerAction::Move, &[(1, 15.0, 25.0)]));
        assert_eq!(phase, GesturePhase::Move);
        assert_eq!(drag.pointer(), Vec2::new(15.0, 25.0));
    }

    #[test]
    fn drag_ignores_moves_while_idle() {
        let mut drag = DragRecognizer::default();
        assert_eq!(
            drag.detect(&ev(PointerAction::Move, &[(1, 5.0, 5.0)])),
            GesturePhase::None
        );
    }

    #[test]
    fn drag_ends_on_up_and_cancel() {
        let mut drag = DragRecognizer::default();
        drag.detect(&ev(PointerAction::Down, &[(1, 0.0, 0.0)]));
        assert_eq!(
            drag.detect(&ev(PointerAction::Up, &[(1, 0.0, 0.0)])),
            GesturePhase::None
        );
        // Idle again: a move must not re-engage without a fresh down.
        assert_eq!(
            drag.detect(&ev(PointerAction::Move, &[(1, 9.0, 9.0)])),
            GesturePhase::None
        );

        drag.detect(&ev(PointerAction::Down, &[(1, 0.0, 0.0)]));
        assert_eq!(
            drag.detect(&ev(PointerAction::Cancel, &[(1, 0.0, 0.0)])),
            GesturePhase::None
        );
    }

    #[test]
    fn drag_slop_filters_jitter() {
        let mut drag = DragRecognizer::new(GestureConfig { touch_slop: 10.0 });
        drag.detect(&ev(PointerAction::Down, &[(1, 0.0, 0.0)]));

        drag.detect(&ev(PointerAction::Move, &[(1, 3.0, 0.0)]));
        assert_eq!(drag.pointer(), Vec2::ZERO);

        drag.detect(&ev(PointerAction::Move, &[(1, 12.0, 0.0)]));
        assert_eq!(drag.pointer(), Vec2::new(12.0, 0.0));
    }

    #[test]
    fn second_finger_hands_drag_off_to_pinch() {
        let mut drag = DragRecognizer::default();
        let mut pinch = PinchRecognizer::default();

        let down = ev(PointerAction::Down, &[(1, 10.0, 10.0)]);
        assert_eq!(drag.detect(&down), GesturePhase::Start);
        assert_eq!(pinch.detect(&down), GesturePhase::None);

        let second = ev(PointerAction::PointerDown, &[(1, 10.0, 10.0), (2, 90.0, 10.0)]);
        assert_eq!(drag.detect(&second), GesturePhase::None);
        assert_eq!(pinch.detect(&second), GesturePhase::Start);
        assert_eq!(
            pinch.pointers(),
            (Vec2::new(10.0, 10.0), Vec2::new(90.0, 10.0))
        );

        let mv = ev(PointerAction::Move, &[(1, 12.0, 10.0), (2, 88.0, 10.0)]);
        assert_eq!(drag.detect(&mv), GesturePhase::None);
        assert_eq!(pinch.detect(&mv), GesturePhase::Move);
    }

    #[test]
    fn pinch_ends_when_a_finger_lifts() {
        let mut pinch = PinchRecognizer::default();
        pinch.detect(&ev(
            PointerAction::PointerDown,
            &[(1, 0.0, 0.0), (2, 100.0, 0.0)],
        ));
        // The lifting pointer is still present in the event.
        assert_eq!(
            pinch.detect(&ev(
                PointerAction::PointerUp,
                &[(1, 0.0, 0.0), (2, 100.0, 0.0)],
            )),
            GesturePhase::None
        );
        // One remaining finger does not restart the pinch.
        assert_eq!(
            pinch.detect(&ev(PointerAction::Move, &[(1, 5.0, 0.0)])),
            GesturePhase::None
        );
    }

    #[test]
    fn three_pointers_are_nobodys_gesture() {
        let mut drag = DragRecognizer::default();
        let mut pinch = PinchRecognizer::default();
        let crowded = ev(
            PointerAction::PointerDown,
            &[(1, 0.0, 0.0), (2, 10.0, 0.0), (3, 20.0, 0.0)],
        );
        assert_eq!(drag.detect(&crowded), GesturePhase::None);
        assert_eq!(pinch.detect(&crowded), GesturePhase::None);
    }

    #[test]
    fn router_pans_by_screen_delta_over_zoom() {
        let mut vp = state(400, 400);
        let mut router = GestureRouter::default();

        router.handle(&mut vp, &ev(PointerAction::Down, &[(1, 100.0, 100.0)]));
        router.handle(&mut vp, &ev(PointerAction::Move, &[(1, 80.0, 110.0)]));

        // Raw +x is mirrored to -x in render space.
        assert_eq!(vp.offset, Vec2::new(20.0, 10.0));
    }

    #[test]
    fn router_anchor_is_not_reused_after_a_gesture_ends() {
        let mut vp = state(400, 400);
        let mut router = GestureRouter::default();

        router.handle(&mut vp, &ev(PointerAction::Down, &[(1, 10.0, 10.0)]));
        router.handle(&mut vp, &ev(PointerAction::Move, &[(1, 20.0, 10.0)]));
        router.handle(&mut vp, &ev(PointerAction::Up, &[(1, 20.0, 10.0)]));
        let after_first = vp.offset;

        // A fresh drag far away must measure from its own anchor, not the
        // stale one.
        router.handle(&mut vp, &ev(PointerAction::Down, &[(1, 300.0, 300.0)]));
        router.handle(&mut vp, &ev(PointerAction::Move, &[(1, 310.0, 300.0)]));
        assert_eq!(vp.offset - after_first, Vec2::new(-10.0, 0.0));
    }
}
