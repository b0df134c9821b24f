use crate::{
    core::geo::LngLat,
    data::geojson::{Feature, Geometry},
    plugins::{
        base::{DrawMode, ModeContext, ModeOptions},
        draw::{
            feature::{DrawFeature, ShapeKind},
            modes::{enter_shape, exit_shape, release_shape, trash_shape, DRAW_RECT},
        },
    },
    Result,
};

/// Press on one corner, drag to the other, release to finish
#[derive(Debug, Default)]
pub struct RectMode {
    feature: Option<String>,
}

impl RectMode {
    pub fn new(_options: &ModeOptions) -> Self {
        Self::default()
    }

    fn stretch(&self, ctx: &mut ModeContext<'_>, at: LngLat) {
        if let Some(id) = &self.feature {
            ctx.update_feature(id, |feature, config| {
                if let ShapeKind::Rect {
                    corner: Some(_),
                    opposite,
                } = &mut feature.kind
                {
                    *opposite = Some(at);
                    feature.refresh(config);
                }
            });
        }
    }
}

impl DrawMode for RectMode {
    fn name(&self) -> &str {
        DRAW_RECT
    }

    fn on_setup(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        self.feature = Some(enter_shape(ctx, Geometry::empty_polygon(), ShapeKind::rect()));
        Ok(())
    }

    fn on_mouse_down(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        if let Some(id) = &self.feature {
            ctx.update_feature(id, |feature, _| {
                if let ShapeKind::Rect { corner, .. } = &mut feature.kind {
                    corner.get_or_insert(at);
                }
            });
        }
        Ok(())
    }

    fn on_drag(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        self.stretch(ctx, at);
        Ok(())
    }

    fn on_mouse_up(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        self.stretch(ctx, at);
        if let Some(id) = &self.feature {
            release_shape(ctx, id);
        }
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        if let Some(id) = self.feature.take() {
            exit_shape(ctx, &id);
        }
        Ok(())
    }

    fn on_trash(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        trash_shape(ctx, self.feature.take().as_deref());
        Ok(())
    }

    fn display(&self, feature: &DrawFeature, selected: bool, out: &mut Vec<Feature>) {
        let drawing = self.feature.as_deref() == Some(feature.id.as_str());
        out.push(feature.display(drawing || selected));
    }
}
