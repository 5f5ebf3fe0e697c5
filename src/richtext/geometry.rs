// Screen geometry reported by the host, in surface pixels

/// Top-left anchor of a floating surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        ScreenPoint { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> i32 {
        self.x + self.width / 2
    }
}

/// Whether a floating surface is shown, and where
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Visibility {
    pub visible: bool,
    pub position: Option<ScreenPoint>,
}

impl Visibility {
    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn shown_at(position: Option<ScreenPoint>) -> Self {
        Visibility {
            visible: true,
            position,
        }
    }
}
