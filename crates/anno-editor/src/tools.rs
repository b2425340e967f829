//! Tool system for canvas interactions.
//!
//! `ModeController` is the interaction state machine: it owns the current
//! `InteractionMode` and answers every mode switch with the ordered list of
//! `ModeEffect`s the layer must carry out (clear measurements, disarm the
//! other handlers, arm the target one). Draw tools turn raw pointer input
//! into a finished `Geometry`.

use crate::input::PointerEvent;
use anno_core::{Geometry, Point};
use kurbo::Vec2;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Shape produced by a draw tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Point,
    Line,
    Polygon,
    Freehand,
    RegularPolygon,
}

/// A gesture handler on the map widget. Exactly one is armed at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Select,
    Draw(ShapeKind),
    Modify,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::Select,
        ToolKind::Draw(ShapeKind::Point),
        ToolKind::Draw(ShapeKind::Line),
        ToolKind::Draw(ShapeKind::Polygon),
        ToolKind::Draw(ShapeKind::Freehand),
        ToolKind::Draw(ShapeKind::RegularPolygon),
        ToolKind::Modify,
    ];
}

// ─── Edit mask ───────────────────────────────────────────────────────────

/// Which transformations the modify handler allows on a selected feature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EditMask(u8);

impl EditMask {
    pub const RESHAPE: EditMask = EditMask(1);
    pub const RESIZE: EditMask = EditMask(2);
    pub const ROTATE: EditMask = EditMask(4);
    pub const DRAG: EditMask = EditMask(8);

    pub const fn empty() -> Self {
        EditMask(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: EditMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn remove(&mut self, other: EditMask) {
        self.0 &= !other.0;
    }
}

impl BitOr for EditMask {
    type Output = EditMask;

    fn bitor(self, rhs: EditMask) -> EditMask {
        EditMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EditMask {
    fn bitor_assign(&mut self, rhs: EditMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EditMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(EditMask, &str); 4] = [
            (EditMask::RESHAPE, "reshape"),
            (EditMask::RESIZE, "resize"),
            (EditMask::ROTATE, "rotate"),
            (EditMask::DRAG, "drag"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "EditMask(empty)")
        } else {
            write!(f, "EditMask({})", names.join("|"))
        }
    }
}

/// Toggles behind the modify and regular-polygon tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyFlags {
    pub rotate: bool,
    pub resize: bool,
    pub drag: bool,
    /// Keep proportions while resizing.
    pub aspect_ratio: bool,
    /// Stretch regular polygons to the dragged box.
    pub irregular: bool,
    pub sides: u32,
}

impl ModifyFlags {
    pub fn new(sides: u32) -> Self {
        Self {
            rotate: false,
            resize: false,
            drag: false,
            aspect_ratio: false,
            irregular: false,
            sides: sides.max(3),
        }
    }

    /// Composite mask. Drag and rotate suppress freeform reshape, as does
    /// an aspect-locked resize.
    pub fn edit_mask(&self) -> EditMask {
        let mut mask = EditMask::RESHAPE;
        if self.rotate {
            mask |= EditMask::ROTATE;
        }
        if self.resize {
            mask |= EditMask::RESIZE;
            if self.aspect_ratio {
                mask.remove(EditMask::RESHAPE);
            }
        }
        if self.drag {
            mask |= EditMask::DRAG;
        }
        if self.rotate || self.drag {
            mask.remove(EditMask::RESHAPE);
        }
        mask
    }

    pub fn options(&self) -> ToolOptions {
        ToolOptions {
            edit_mask: self.edit_mask(),
            sides: self.sides,
            irregular: self.irregular,
            aspect_ratio: self.aspect_ratio,
        }
    }
}

/// Settings pushed to the widget's handlers when they change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolOptions {
    pub edit_mask: EditMask,
    pub sides: u32,
    pub irregular: bool,
    pub aspect_ratio: bool,
}

// ─── Mode controller ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Select armed, nothing drawn.
    Idle,
    Draw(ShapeKind),
    Select,
    Modify(EditMask),
    /// Selecting a feature deletes it.
    Erase,
    /// Lines drawn here are measured, never persisted.
    Measure,
}

impl InteractionMode {
    /// Handler armed while this mode is active.
    pub fn tool(&self) -> ToolKind {
        match self {
            InteractionMode::Idle | InteractionMode::Select | InteractionMode::Erase => {
                ToolKind::Select
            }
            InteractionMode::Draw(shape) => ToolKind::Draw(*shape),
            InteractionMode::Modify(_) => ToolKind::Modify,
            InteractionMode::Measure => ToolKind::Draw(ShapeKind::Line),
        }
    }
}

/// One step the layer carries out after a mode switch, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEffect {
    /// Drop every measure-only feature.
    ClearMeasurements,
    Disarm(ToolKind),
    Arm(ToolKind),
    Configure(ToolOptions),
    /// Put every selected feature under the modify handler.
    EditSelection(EditMask),
    /// Take every selected feature out of the modify handler.
    ReleaseSelection,
}

#[derive(Debug)]
pub struct ModeController {
    mode: InteractionMode,
    flags: ModifyFlags,
    erase_suspended: bool,
}

impl ModeController {
    pub fn new(sides: u32) -> Self {
        Self {
            mode: InteractionMode::Idle,
            flags: ModifyFlags::new(sides),
            erase_suspended: false,
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn flags(&self) -> &ModifyFlags {
        &self.flags
    }

    pub fn is_measuring(&self) -> bool {
        self.mode == InteractionMode::Measure
    }

    /// Whether a select gesture should delete the picked feature.
    pub fn erases_on_select(&self) -> bool {
        self.mode == InteractionMode::Erase && !self.erase_suspended
    }

    /// Enter `target`. Effects are ordered: measurements first, then every
    /// other handler disarmed, then the target armed.
    pub fn switch(&mut self, target: InteractionMode) -> Vec<ModeEffect> {
        let previous = self.mode;
        // Entering any mode clears erase, Erase itself included.
        self.erase_suspended = false;
        self.mode = target;
        log::debug!("mode: {previous:?} -> {target:?}");

        let armed = target.tool();
        let mut effects = vec![ModeEffect::ClearMeasurements];
        for tool in ToolKind::ALL {
            if tool == armed {
                continue;
            }
            effects.push(ModeEffect::Disarm(tool));
            if tool == ToolKind::Modify && matches!(previous, InteractionMode::Modify(_)) {
                effects.push(ModeEffect::ReleaseSelection);
            }
        }
        effects.push(ModeEffect::Configure(self.flags.options()));
        effects.push(ModeEffect::Arm(armed));
        if let InteractionMode::Modify(mask) = target {
            effects.push(ModeEffect::EditSelection(mask));
        }
        effects
    }

    /// Enter plain reshape editing, dropping the other modify toggles.
    pub fn toggle_edit(&mut self) -> Vec<ModeEffect> {
        self.modify_with(false, false, false)
    }

    /// Rotate, resize and drag are exclusive tool buttons: picking one
    /// drops the other two, and picking it again keeps it.
    pub fn toggle_rotate(&mut self) -> Vec<ModeEffect> {
        self.modify_with(true, false, false)
    }

    pub fn toggle_resize(&mut self) -> Vec<ModeEffect> {
        self.modify_with(false, true, false)
    }

    pub fn toggle_drag(&mut self) -> Vec<ModeEffect> {
        self.modify_with(false, false, true)
    }

    pub fn toggle_aspect_ratio(&mut self) -> Vec<ModeEffect> {
        self.flags.aspect_ratio = !self.flags.aspect_ratio;
        self.reconfigure()
    }

    pub fn toggle_irregular(&mut self) -> Vec<ModeEffect> {
        self.flags.irregular = !self.flags.irregular;
        self.reconfigure()
    }

    /// Vertex count of the regular-polygon tool. Fewer than 3 is ignored.
    pub fn set_sides(&mut self, sides: u32) -> Vec<ModeEffect> {
        if sides < 3 {
            log::warn!("mode: ignoring regular polygon with {sides} sides");
            return vec![];
        }
        self.flags.sides = sides;
        self.reconfigure()
    }

    /// Pause erase while the layer selects a feature on its own behalf.
    /// Returns the previous suspension, for `restore_erase`.
    pub fn suspend_erase(&mut self) -> bool {
        std::mem::replace(&mut self.erase_suspended, true)
    }

    pub fn restore_erase(&mut self, saved: bool) {
        self.erase_suspended = saved;
    }

    fn modify_with(&mut self, rotate: bool, resize: bool, drag: bool) -> Vec<ModeEffect> {
        self.flags.rotate = rotate;
        self.flags.resize = resize;
        self.flags.drag = drag;
        self.switch(InteractionMode::Modify(self.flags.edit_mask()))
    }

    /// Push new options; when modifying, the new mask applies right away.
    fn reconfigure(&mut self) -> Vec<ModeEffect> {
        let mut effects = vec![ModeEffect::Configure(self.flags.options())];
        if let InteractionMode::Modify(_) = self.mode {
            let mask = self.flags.edit_mask();
            self.mode = InteractionMode::Modify(mask);
            effects.push(ModeEffect::EditSelection(mask));
        }
        effects
    }
}

// ─── Draw tools ──────────────────────────────────────────────────────────

/// Trait for tools that turn pointer input into a shape.
pub trait DrawTool {
    fn shape(&self) -> ShapeKind;

    /// Handle a pointer event, returning the shape once it is complete.
    fn handle(&mut self, event: &PointerEvent) -> Option<Geometry>;
}

/// Build the draw tool for a shape, configured from `options`.
pub fn draw_tool(shape: ShapeKind, options: &ToolOptions) -> Box<dyn DrawTool> {
    match shape {
        ShapeKind::Point => Box::new(PointTool),
        ShapeKind::Line => Box::new(PathTool::new(false)),
        ShapeKind::Polygon => Box::new(PathTool::new(true)),
        ShapeKind::Freehand => Box::<FreehandTool>::default(),
        ShapeKind::RegularPolygon => Box::new(RegularPolygonTool::new(options.sides, options.irregular)),
    }
}

pub struct PointTool;

impl DrawTool for PointTool {
    fn shape(&self) -> ShapeKind {
        ShapeKind::Point
    }

    fn handle(&mut self, event: &PointerEvent) -> Option<Geometry> {
        match event {
            PointerEvent::Up(p) => Some(Geometry::Point(*p)),
            _ => None,
        }
    }
}

/// Click-by-click path: every release adds a vertex, `Finish` closes it.
pub struct PathTool {
    closed: bool,
    vertices: Vec<Point>,
}

impl PathTool {
    pub fn new(closed: bool) -> Self {
        Self {
            closed,
            vertices: Vec::new(),
        }
    }
}

impl DrawTool for PathTool {
    fn shape(&self) -> ShapeKind {
        if self.closed {
            ShapeKind::Polygon
        } else {
            ShapeKind::Line
        }
    }

    fn handle(&mut self, event: &PointerEvent) -> Option<Geometry> {
        match event {
            PointerEvent::Up(p) => {
                self.vertices.push(*p);
                None
            }
            PointerEvent::Cancel => {
                self.vertices.clear();
                None
            }
            PointerEvent::Finish => {
                let mut vertices = std::mem::take(&mut self.vertices);
                if self.closed {
                    if vertices.len() < 3 {
                        return None;
                    }
                    vertices.push(vertices[0]);
                    Some(Geometry::Polygon(vec![vertices]))
                } else if vertices.len() >= 2 {
                    Some(Geometry::LineString(vertices))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Closed outline sampled while the pointer is held down.
#[derive(Default)]
pub struct FreehandTool {
    drawing: bool,
    samples: Vec<Point>,
}

impl DrawTool for FreehandTool {
    fn shape(&self) -> ShapeKind {
        ShapeKind::Freehand
    }

    fn handle(&mut self, event: &PointerEvent) -> Option<Geometry> {
        match event {
            PointerEvent::Down(p) => {
                self.drawing = true;
                self.samples = vec![*p];
                None
            }
            PointerEvent::Move(p) if self.drawing => {
                if self.samples.last() != Some(p) {
                    self.samples.push(*p);
                }
                None
            }
            PointerEvent::Up(p) if self.drawing => {
                self.drawing = false;
                let mut ring = std::mem::take(&mut self.samples);
                if ring.last() != Some(p) {
                    ring.push(*p);
                }
                if ring.len() < 3 {
                    return None;
                }
                ring.push(ring[0]);
                Some(Geometry::Polygon(vec![ring]))
            }
            PointerEvent::Cancel => {
                self.drawing = false;
                self.samples.clear();
                None
            }
            _ => None,
        }
    }
}

/// Drag-out regular polygon.
///
/// In regular mode the press point is the center and the release point a
/// vertex. In irregular mode the polygon is stretched to the dragged box.
pub struct RegularPolygonTool {
    sides: u32,
    irregular: bool,
    start: Option<Point>,
}

impl RegularPolygonTool {
    pub fn new(sides: u32, irregular: bool) -> Self {
        Self {
            sides: sides.max(3),
            irregular,
            start: None,
        }
    }

    /// Shape spanned by a drag from `start` to `end`.
    pub fn generate(&self, start: Point, end: Point) -> Option<Geometry> {
        if start == end {
            return None;
        }
        if self.irregular {
            return Some(Geometry::stretched_polygon(start, end, self.sides));
        }
        let arm: Vec2 = end - start;
        Some(Geometry::regular_polygon(
            start,
            arm.hypot(),
            self.sides,
            arm.atan2(),
        ))
    }
}

impl DrawTool for RegularPolygonTool {
    fn shape(&self) -> ShapeKind {
        ShapeKind::RegularPolygon
    }

    fn handle(&mut self, event: &PointerEvent) -> Option<Geometry> {
        match event {
            PointerEvent::Down(p) => {
                self.start = Some(*p);
                None
            }
            PointerEvent::Up(end) => {
                let start = self.start.take()?;
                self.generate(start, *end)
            }
            PointerEvent::Cancel => {
                self.start = None;
                None
            }
            _ => None,
        }
    }
}
