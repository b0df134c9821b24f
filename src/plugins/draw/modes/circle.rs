use crate::{
    core::geo::{distance_km, LngLat},
    data::geojson::{Feature, Geometry},
    plugins::{
        base::{DrawMode, ModeContext, ModeOptions},
        draw::{
            feature::{DrawFeature, ShapeKind},
            modes::{enter_shape, exit_shape, release_shape, trash_shape, DRAW_CIRCLE},
        },
    },
    Result,
};

/// Press to place the center, drag to size, release to finish
#[derive(Debug, Default)]
pub struct CircleMode {
    feature: Option<String>,
    override_previous: bool,
}

impl CircleMode {
    pub fn new(options: &ModeOptions) -> Self {
        Self {
            feature: None,
            override_previous: options.override_previous,
        }
    }

    fn has_center(ctx: &ModeContext<'_>, id: &str) -> bool {
        matches!(
            ctx.feature(id).map(|feature| &feature.kind),
            Some(ShapeKind::Circle {
                center: Some(_),
                ..
            })
        )
    }
}

impl DrawMode for CircleMode {
    fn name(&self) -> &str {
        DRAW_CIRCLE
    }

    fn on_setup(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        if self.override_previous {
            if let Some(previous) = ctx.last_circle.clone() {
                if Self::has_center(ctx, &previous) {
                    ctx.delete_features(&[previous], false);
                }
            }
        }
        let id = enter_shape(ctx, Geometry::empty_polygon(), ShapeKind::circle());
        *ctx.last_circle = Some(id.clone());
        self.feature = Some(id);
        Ok(())
    }

    fn on_mouse_down(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        if let Some(id) = &self.feature {
            ctx.update_feature(id, |feature, _| {
                if let ShapeKind::Circle { center, .. } = &mut feature.kind {
                    center.get_or_insert(at);
                }
            });
        }
        Ok(())
    }

    fn on_drag(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        if let Some(id) = &self.feature {
            ctx.update_feature(id, |feature, config| {
                if let ShapeKind::Circle {
                    center: Some(center),
                    radius,
                } = &mut feature.kind
                {
                    *radius = distance_km(*center, at);
                    feature.refresh(config);
                }
            });
        }
        Ok(())
    }

    fn on_mouse_up(&mut self, ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        if let Some(id) = &self.feature {
            release_shape(ctx, id);
        }
        Ok(())
    }

    /// A click without a drag starts over
    fn on_click(&mut self, ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        if let Some(id) = &self.feature {
            ctx.update_feature(id, |feature, _| {
                feature.kind = ShapeKind::circle();
                feature.geometry = Geometry::empty_polygon();
            });
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

    /// The circle being drawn stays hidden until it has a center
    fn display(&self, feature: &DrawFeature, selected: bool, out: &mut Vec<Feature>) {
        let drawing = self.feature.as_deref() == Some(feature.id.as_str());
        if drawing && !matches!(feature.kind, ShapeKind::Circle { center: Some(_), .. }) {
            return;
        }
        out.push(feature.display(drawing || selected));
    }
}
