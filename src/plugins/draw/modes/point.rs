use crate::{
    core::geo::LngLat,
    data::geojson::Geometry,
    plugins::{
        base::{DrawMode, ModeContext, ModeOptions},
        draw::{
            feature::ShapeKind,
            modes::{ADD_CURSOR, DRAW_POINT, SIMPLE_SELECT},
            DrawEventKind,
        },
    },
    Result,
};

/// One click places a point
#[derive(Debug, Default)]
pub struct PointMode;

impl PointMode {
    pub fn new(_options: &ModeOptions) -> Self {
        Self
    }
}

impl DrawMode for PointMode {
    fn name(&self) -> &str {
        DRAW_POINT
    }

    fn on_setup(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        ctx.select(Vec::new());
        ctx.set_cursor(ADD_CURSOR);
        Ok(())
    }

    fn on_click(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        let id = ctx.add_feature(Geometry::Point { coordinates: at }, ShapeKind::Generic);
        if let Some(feature) = ctx.feature(&id).cloned() {
            ctx.emit(DrawEventKind::Create, vec![feature], None);
        }
        ctx.change_mode(SIMPLE_SELECT, ModeOptions::feature(id));
        Ok(())
    }

    fn on_key_up(&mut self, ctx: &mut ModeContext<'_>, key: &str) -> Result<()> {
        if key == "Escape" || key == "Enter" {
            ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
        }
        Ok(())
    }

    fn on_trash(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        ctx.set_cursor("");
        Ok(())
    }
}
