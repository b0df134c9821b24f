use crate::{
    core::geo::LngLat,
    data::geojson::{Feature, Geometry},
    plugins::{
        base::{DrawMode, ModeContext, ModeOptions},
        draw::{
            feature::{DrawFeature, ShapeKind},
            modes::{ADD_CURSOR, DRAW_LINE_STRING, SIMPLE_SELECT},
            DrawEventKind,
        },
        measure::RangingSession,
    },
    Result,
};

/// Click to place vertices; double click, Enter or a click on the last
/// vertex finishes the line
#[derive(Debug, Default)]
pub struct LineMode {
    feature: Option<String>,
    ranging: bool,
    session: Option<RangingSession>,
    points: Vec<LngLat>,
    floating: Option<LngLat>,
}

impl LineMode {
    pub fn new(options: &ModeOptions) -> Self {
        Self {
            ranging: options.ranging,
            ..Self::default()
        }
    }

    fn sync(&self, ctx: &mut ModeContext<'_>) {
        let Some(id) = &self.feature else {
            return;
        };
        let mut coordinates = self.points.clone();
        coordinates.extend(self.floating);
        ctx.update_feature(id, |feature, _| {
            feature.geometry = Geometry::LineString { coordinates };
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
        if let Some(session) = self.session.take() {
            session.discard(ctx.engine());
        }
        ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
    }
}

impl DrawMode for LineMode {
    fn name(&self) -> &str {
        DRAW_LINE_STRING
    }

    fn on_setup(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        ctx.select(Vec::new());
        ctx.set_double_click_zoom(false);
        ctx.set_cursor(ADD_CURSOR);
        let id = ctx.add_feature(
            Geometry::LineString {
                coordinates: Vec::new(),
            },
            ShapeKind::Generic,
        );
        let ranging = self.ranging;
        ctx.update_feature(&id, |feature, _| feature.ranging = ranging);
        self.session = ranging.then(RangingSession::new);
        self.feature = Some(id);
        Ok(())
    }

    fn on_click(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        if let Some(last) = self.points.last() {
            if ctx.is_near(*last, at) {
                self.finish(ctx);
                return Ok(());
            }
        }
        self.points.push(at);
        self.floating = Some(at);
        if let Some(session) = self.session.as_mut() {
            session.add_vertex(ctx.engine(), at);
        }
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
        let session = self.session.take();
        let Some(id) = self.feature.take() else {
            if let Some(session) = session {
                session.discard(ctx.engine());
            }
            return Ok(());
        };

        match ctx.feature(&id).cloned() {
            Some(feature) if feature.is_valid() => {
                log::debug!("created line `{}` with {} vertices", id, self.points.len());
                ctx.emit(DrawEventKind::Create, vec![feature], None);
                if let (Some(session), Some(last)) = (session, self.points.last()) {
                    let line = session.finish(ctx.engine(), *last);
                    ctx.ranging.insert(id, line);
                }
            }
            Some(_) => {
                log::debug!("discarding unfinished line `{}`", id);
                ctx.delete_features(&[id], true);
                if let Some(session) = session {
                    session.discard(ctx.engine());
                }
                ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
            }
            None => {
                if let Some(session) = session {
                    session.discard(ctx.engine());
                }
            }
        }
        Ok(())
    }

    fn display(&self, feature: &DrawFeature, selected: bool, out: &mut Vec<Feature>) {
        let drawing = self.feature.as_deref() == Some(feature.id.as_str());
        out.push(feature.display(drawing || selected));
    }
}
