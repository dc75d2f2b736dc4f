use crate::geometry::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    PanUp,
    PanDown,
    PanLeft,
    PanRight,
    Quit,
}

const ACTION_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::PanUp => 0,
            InputAction::PanDown => 1,
            InputAction::PanLeft => 2,
            InputAction::PanRight => 3,
            InputAction::Quit => 4,
        }
    }
}

/// Input state sampled once per simulation tick. Pressed flags are edges: they are set for
/// exactly one tick after the press.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_click_pressed: bool,
    right_click_pressed: bool,
    save_pressed: bool,
    zoom_delta_steps: i32,
    window_size: (u32, u32),
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn quit_requested(&self) -> bool {
        self.actions.is_down(InputAction::Quit)
    }

    /// Unit-length pan direction in world axes from the held pan keys.
    pub fn pan_direction(&self) -> Vec2 {
        let mut direction = Vec2::ZERO;
        if self.is_down(InputAction::PanUp) {
            direction.y -= 1.0;
        }
        if self.is_down(InputAction::PanDown) {
            direction.y += 1.0;
        }
        if self.is_down(InputAction::PanLeft) {
            direction.x -= 1.0;
        }
        if self.is_down(InputAction::PanRight) {
            direction.x += 1.0;
        }
        let length = direction.length();
        if length > 0.0 {
            direction / length
        } else {
            direction
        }
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn right_click_pressed(&self) -> bool {
        self.right_click_pressed
    }

    pub fn save_pressed(&self) -> bool {
        self.save_pressed
    }

    pub fn zoom_delta_steps(&self) -> i32 {
        self.zoom_delta_steps
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.window_size
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_left_click_pressed(mut self, pressed: bool) -> Self {
        self.left_click_pressed = pressed;
        self
    }

    pub fn with_right_click_pressed(mut self, pressed: bool) -> Self {
        self.right_click_pressed = pressed;
        self
    }

    pub fn with_save_pressed(mut self, pressed: bool) -> Self {
        self.save_pressed = pressed;
        self
    }

    pub fn with_zoom_delta_steps(mut self, steps: i32) -> Self {
        self.zoom_delta_steps = steps;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_size = window_size;
        self
    }
}
