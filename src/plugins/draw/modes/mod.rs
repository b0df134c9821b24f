//! Built-in draw modes
//!
//! The three single-drag shape modes (circle, rectangle, arrow) share their
//! enter, release and exit steps through the helpers below.

pub mod arrow;
pub mod circle;
pub mod direct_select;
pub mod line;
pub mod point;
pub mod polygon;
pub mod rect;
pub mod simple_select;

use crate::{
    data::geojson::Geometry,
    plugins::{
        base::{DrawMode, ModeContext, ModeOptions},
        draw::{feature::ShapeKind, DrawEventKind, ModeFactory},
    },
};
use std::sync::Arc;

pub const SIMPLE_SELECT: &str = "simple_select";
pub const DIRECT_SELECT: &str = "direct_select";
pub const DRAW_CIRCLE: &str = "draw_circle";
pub const DRAW_RECT: &str = "draw_rect";
pub const DRAW_ARROW: &str = "draw_arrow";
pub const DRAW_LINE_STRING: &str = "draw_line_string";
pub const DRAW_POLYGON: &str = "draw_polygon";
pub const DRAW_POINT: &str = "draw_point";

pub(crate) const ADD_CURSOR: &str = "crosshair";

fn factory<M, F>(build: F) -> ModeFactory
where
    M: DrawMode + 'static,
    F: Fn(&ModeOptions) -> M + Send + Sync + 'static,
{
    Arc::new(move |options: &ModeOptions| Box::new(build(options)) as Box<dyn DrawMode>)
}

/// Every mode the control registers at construction
pub fn builtin() -> Vec<(&'static str, ModeFactory)> {
    vec![
        (SIMPLE_SELECT, factory(simple_select::SimpleSelectMode::new)),
        (DIRECT_SELECT, factory(direct_select::DirectSelectMode::new)),
        (DRAW_CIRCLE, factory(circle::CircleMode::new)),
        (DRAW_RECT, factory(rect::RectMode::new)),
        (DRAW_ARROW, factory(arrow::ArrowMode::new)),
        (DRAW_LINE_STRING, factory(line::LineMode::new)),
        (DRAW_POLYGON, factory(polygon::PolygonMode::new)),
        (DRAW_POINT, factory(point::PointMode::new)),
    ]
}

/// Creates the in-progress shape and locks the map for drawing
pub(crate) fn enter_shape(ctx: &mut ModeContext<'_>, geometry: Geometry, kind: ShapeKind) -> String {
    ctx.select(Vec::new());
    ctx.set_drag_pan(false);
    ctx.set_cursor(ADD_CURSOR);
    ctx.add_feature(geometry, kind)
}

/// Pointer released: hand the shape over to selection
pub(crate) fn release_shape(ctx: &mut ModeContext<'_>, id: &str) {
    ctx.set_drag_pan(true);
    ctx.change_mode(SIMPLE_SELECT, ModeOptions::feature(id));
}

/// Fires the creation of a finished shape or discards an unfinished one
pub(crate) fn exit_shape(ctx: &mut ModeContext<'_>, id: &str) {
    ctx.set_drag_pan(true);
    ctx.set_cursor("");
    let Some(feature) = ctx.feature(id).cloned() else {
        return;
    };
    if feature.is_valid() {
        log::debug!("created {} `{}`", feature.geometry.type_name(), id);
        ctx.emit(DrawEventKind::Create, vec![feature], None);
    } else {
        log::debug!("discarding unfinished shape `{}`", id);
        ctx.delete_features(&[id.to_string()], true);
        ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
    }
}

/// Deletes the in-progress shape and leaves the mode
pub(crate) fn trash_shape(ctx: &mut ModeContext<'_>, id: Option<&str>) {
    if let Some(id) = id {
        ctx.delete_features(&[id.to_string()], true);
    }
    ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
}
