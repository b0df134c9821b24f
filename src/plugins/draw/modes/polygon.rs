use crate::{
    core::geo::LngLat,
    data::geojson::{Feature, Geometry},
    plugins::{
        base::{DrawMode, ModeContext, ModeOptions},
        draw::{
            feature::{DrawFeature, ShapeKind},
            modes::{ADD_CURSOR, DRAW_POLYGON, SIMPLE_SELECT},
            DrawEventKind,
        },
    },
    Result,
};

/// Click to place vertices; clicking the first or last vertex closes the ring
#[derive(Debug, Default)]
pub struct PolygonMode {
    feature: Option<String>,
    points: Vec<LngLat>,
    floating: Option<LngLat>,
}

impl PolygonMode {
    pub fn new(_options: &ModeOptions) -> Self {
        Self::default()
    }

    /// Placed vertices, the floating one, then the first again
    fn sync(&self, ctx: &mut ModeContext<'_>) {
        let Some(id) = &self.feature else {
            return;
        };
        let mut ring = self.points.clone();
        ring.extend(self.floating);
        ring.extend(self.points.first().copied());
        ctx.update_feature(id, |feature, _| {
            feature.geometry = Geometry::Polygon {
                coordinates: vec![ring],
            };
        });
    }

    fn finish(&self, ctx: &mut ModeContext<'_>) {
        if let Some(id) = &self.feature {
            ctx.change_mode(SIMPLE_SELECT, ModeOptions::feature(id.as_str()));
        }
    }

    fn cancel(&mut self, ctx: &mut ModeContext<'_>) {
        if let Some(id) = self.feature.take() {
            ctx.delete_features(&[id], true);
        }
        ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
    }
}

impl DrawMode for PolygonMode {
    fn name(&self) -> &str {
        DRAW_POLYGON
    }

    fn on_setup(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        ctx.select(Vec::new());
        ctx.set_double_click_zoom(false);
        ctx.set_cursor(ADD_CURSOR);
        self.feature = Some(ctx.add_feature(Geometry::empty_polygon(), ShapeKind::Generic));
        Ok(())
    }

    fn on_click(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        let closes_first = self.points.len() >= 3
            && self
                .points
                .first()
                .is_some_and(|first| ctx.is_near(*first, at));
        let closes_last = self
            .points
            .last()
            .is_some_and(|last| ctx.is_near(*last, at));
        if closes_first || closes_last {
            self.finish(ctx);
            return Ok(());
        }
        self.points.push(at);
        self.floating = Some(at);
        self.sync(ctx);
        Ok(())
    }

    fn on_mouse_move(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        if !self.points.is_empty() {
            self.floating = Some(at);
            self.sync(ctx);
        }
        Ok(())
    }

    fn on_double_click(&mut self, ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        self.finish(ctx);
        Ok(())
    }

    fn on_key_up(&mut self, ctx: &mut ModeContext<'_>, key: &str) -> Result<()> {
        match key {
            "Enter" => self.finish(ctx),
            "Escape" => self.cancel(ctx),
            _ => {}
        }
        Ok(())
    }

    fn on_trash(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        self.cancel(ctx);
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        ctx.set_double_click_zoom(true);
        ctx.set_cursor("");
        self.floating = None;
        self.sync(ctx);
        let Some(id) = self.feature.take() else {
            return Ok(());
        };
        match ctx.feature(&id).cloned() {
            Some(feature) if feature.is_valid() => {
                log::debug!("created polygon `{}` with {} vertices", id, self.points.len());
                ctx.emit(DrawEventKind::Create, vec![feature], None);
            }
            Some(_) => {
                log::debug!("discarding unfinished polygon `{}`", id);
                ctx.delete_features(&[id], true);
                ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
            }
            None => {}
        }
        Ok(())
    }

    fn display(&self, feature: &DrawFeature, selected: bool, out: &mut Vec<Feature>) {
        let drawing = self.feature.as_deref() == Some(feature.id.as_str());
        out.push(feature.display(drawing || selected));
    }
}
