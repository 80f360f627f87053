//! Platform-independent pointer events.
//!
//! Raw egui input is folded into [`PointerEvent`]s so the recognizers never
//! see the windowing layer and can be driven with synthetic events in tests.

use crate::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// First pointer touched down.
    Down,
    Move,
    /// Last pointer lifted.
    Up,
    Cancel,
    /// An additional pointer touched down.
    PointerDown,
    /// A non-last pointer lifted.
    PointerUp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub id: u64,
    pub pos: Vec2,
}

/// One dispatched input event. `pointers` is ordered by stable slot
/// (insertion order), not by arrival time, so "pointer A" stays pointer A
/// for the whole gesture. `Up`/`PointerUp`/`Cancel` events still include
/// the lifting pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub pointers: Vec<Pointer>,
}

impl PointerEvent {
    pub fn count(&self) -> usize {
        self.pointers.len()
    }
}

/// Opaque device tuning for the recognizers. `touch_slop` filters pointer
/// jitter below the given distance (in points); zero disables filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureConfig {
    pub touch_slop: f32,
}

/// Maintains the pointer slot table and turns egui events into
/// [`PointerEvent`]s. Mouse input is mirrored as a single synthetic pointer
/// so the same gestures work on desktop, but only until the first real
/// touch event arrives — egui mirrors touches back as pointer events, and
/// handling both would dispatch every gesture twice.
#[derive(Debug, Default)]
pub struct TouchTracker {
    slots: Vec<Pointer>,
    saw_touch: bool,
    mouse_down: bool,
}

impl TouchTracker {
    const MOUSE_POINTER_ID: u64 = u64::MAX;

    pub fn feed(&mut self, events: &[egui::Event], canvas: egui::Rect) -> Vec<PointerEvent> {
        let mut out = Vec::new();
        for event in events {
            let emitted = match *event {
                egui::Event::Touch { id, phase, pos, .. } => {
                    self.saw_touch = true;
                    self.on_touch(id.0, phase, local(pos, canvas))
                }
                egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    ..
                } if !self.saw_touch => {
                    self.on_mouse_button(pressed, local(pos, canvas), canvas.contains(pos))
                }
                egui::Event::PointerMoved(pos) if !self.saw_touch => {
                    self.on_mouse_moved(local(pos, canvas))
                }
                _ => None,
            };
            out.extend(emitted);
        }
        out
    }

    pub fn on_touch(
        &mut self,
        id: u64,
        phase: egui::TouchPhase,
        pos: Vec2,
    ) -> Option<PointerEvent> {
        match phase {
            egui::TouchPhase::Start => {
                if self.slot_of(id).is_some() {
                    return None;
                }
                self.slots.push(Pointer { id, pos });
                let action = if self.slots.len() == 1 {
                    PointerAction::Down
                } else {
                    PointerAction::PointerDown
                };
                Some(self.snapshot(action))
            }
            egui::TouchPhase::Move => {
                let slot = self.slot_of(id)?;
                self.slots[slot].pos = pos;
                Some(self.snapshot(PointerAction::Move))
            }
            egui::TouchPhase::End | egui::TouchPhase::Cancel => {
                let slot = self.slot_of(id)?;
                self.slots[slot].pos = pos;
                let action = if phase == egui::TouchPhase::Cancel {
                    PointerAction::Cancel
                } else if self.slots.len() == 1 {
                    PointerAction::Up
                } else {
                    PointerAction::PointerUp
                };
                let event = self.snapshot(action);
                self.slots.remove(slot);
                Some(event)
            }
        }
    }

    fn on_mouse_button(
        &mut self,
        pressed: bool,
        pos: Vec2,
        inside_canvas: bool,
    ) -> Option<PointerEvent> {
        if pressed {
            if !inside_canvas || self.mouse_down {
                return None;
            }
            self.mouse_down = true;
            self.on_touch(Self::MOUSE_POINTER_ID, egui::TouchPhase::Start, pos)
        } else {
            if !self.mouse_down {
                return None;
            }
            self.mouse_down = false;
            self.on_touch(Self::MOUSE_POINTER_ID, egui::TouchPhase::End, pos)
        }
    }

    fn on_mouse_moved(&mut self, pos: Vec2) -> Option<PointerEvent> {
        if !self.mouse_down {
            return None;
        }
        self.on_touch(Self::MOUSE_POINTER_ID, egui::TouchPhase::Move, pos)
    }

    fn snapshot(&self, action: PointerAction) -> PointerEvent {
        PointerEvent {
            action,
            pointers: self.slots.clone(),
        }
    }

    fn slot_of(&self, id: u64) -> Option<usize> {
        self.slots.iter().position(|p| p.id == id)
    }
}

fn local(pos: egui::Pos2, canvas: egui::Rect) -> Vec2 {
    Vec2::new(pos.x - canvas.min.x, pos.y - canvas.min.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::TouchPhase;

    #[test]
    fn first_touch_is_down_second_is_pointer_down() {
        let mut tracker = TouchTracker::default();

        let ev = tracker
            .on_touch(7, TouchPhase::Start, Vec2::new(10.0, 20.0))
            .unwrap();
        assert_eq!(ev.action, PointerAction::Down);
        assert_eq!(ev.count(), 1);
        assert_eq!(ev.pointers[0].id, 7);

        let ev = tracker
            .on_touch(9, TouchPhase::Start, Vec2::new(50.0, 60.0))
            .unwrap();
        assert_eq!(ev.action, PointerAction::PointerDown);
        assert_eq!(ev.count(), 2);
    }

    #[test]
    fn slot_order_is_stable_across_moves() {
        let mut tracker = TouchTracker::default();
        tracker.on_touch(7, TouchPhase::Start, Vec2::new(0.0, 0.0));
        tracker.on_touch(9, TouchPhase::Start, Vec2::new(100.0, 0.0));

        // The second finger moving first must not reorder the slots.
        let ev = tracker
            .on_touch(9, TouchPhase::Move, Vec2::new(120.0, 0.0))
            .unwrap();
        assert_eq!(ev.pointers[0].id, 7);
        assert_eq!(ev.pointers[1].id, 9);
        assert_eq!(ev.pointers[1].pos, Vec2::new(120.0, 0.0));
    }

    #[test]
    fn lifting_pointer_is_included_then_removed() {
        let mut tracker = TouchTracker::default();
        tracker.on_touch(7, TouchPhase::Start, Vec2::new(0.0, 0.0));
        tracker.on_touch(9, TouchPhase::Start, Vec2::new(100.0, 0.0));

        let ev = tracker
            .on_touch(9, TouchPhase::End, Vec2::new(100.0, 0.0))
            .unwrap();
        assert_eq!(ev.action, PointerAction::PointerUp);
        assert_eq!(ev.count(), 2);

        let ev = tracker
            .on_touch(7, TouchPhase::Move, Vec2::new(5.0, 0.0))
            .unwrap();
        assert_eq!(ev.action, PointerAction::Move);
        assert_eq!(ev.count(), 1);

        let ev = tracker
            .on_touch(7, TouchPhase::End, Vec2::new(5.0, 0.0))
            .unwrap();
        assert_eq!(ev.action, PointerAction::Up);
        assert_eq!(ev.count(), 1);
    }

    #[test]
    fn cancel_is_reported_and_clears_the_slot() {
        let mut tracker = TouchTracker::default();
        tracker.on_touch(7, TouchPhase::Start, Vec2::new(0.0, 0.0));

        let ev = tracker
            .on_touch(7, TouchPhase::Cancel, Vec2::new(0.0, 0.0))
            .unwrap();
        assert_eq!(ev.action, PointerAction::Cancel);
        assert!(tracker.on_touch(7, TouchPhase::Move, Vec2::ZERO).is_none());
    }

    #[test]
    fn mouse_synthesis_stops_once_a_real_touch_is_seen() {
        let mut tracker = TouchTracker::default();

        let ev = tracker.on_mouse_button(true, Vec2::new(1.0, 1.0), true);
        assert_eq!(ev.unwrap().action, PointerAction::Down);
        tracker.on_mouse_button(false, Vec2::new(1.0, 1.0), true);

        tracker.saw_touch = true;
        let canvas = egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(100.0, 100.0));
        let events = vec![egui::Event::PointerMoved(egui::pos2(2.0, 2.0))];
        assert!(tracker.feed(&events, canvas).is_empty());
    }
}
