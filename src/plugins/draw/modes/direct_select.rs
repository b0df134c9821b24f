use crate::{
    core::geo::LngLat,
    data::geojson::Feature,
    plugins::{
        base::{DrawMode, ModeContext, ModeOptions},
        draw::{
            feature::{vertex_display, DrawFeature, Grip},
            modes::{DIRECT_SELECT, SIMPLE_SELECT},
            DrawEventKind,
        },
    },
    MapError, Result,
};

/// Edits the vertices of a single feature
#[derive(Debug, Default)]
pub struct DirectSelectMode {
    feature: String,
    grip: Option<Grip>,
    drag_from: Option<LngLat>,
    moved: bool,
    suppress_click: bool,
}

impl DirectSelectMode {
    pub fn new(options: &ModeOptions) -> Self {
        Self {
            feature: options.feature_ids.first().cloned().unwrap_or_default(),
            ..Self::default()
        }
    }

    fn handle_at(&self, ctx: &ModeContext<'_>, at: LngLat) -> Option<Grip> {
        let feature = ctx.feature(&self.feature)?;
        let (path, _) = feature
            .handles()
            .into_iter()
            .find(|(_, vertex)| ctx.is_near(*vertex, at))?;
        feature.grab(path)
    }
}

impl DrawMode for DirectSelectMode {
    fn name(&self) -> &str {
        DIRECT_SELECT
    }

    fn on_setup(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        if !ctx.store().contains(&self.feature) {
            return Err(MapError::Draw(format!(
                "direct_select needs an existing feature, got `{}`",
                self.feature
            )));
        }
        ctx.select(vec![self.feature.clone()]);
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        let gripped = self.grip.take().is_some();
        let dragging = self.drag_from.take().is_some();
        if gripped || dragging {
            ctx.set_drag_pan(true);
        }
        Ok(())
    }

    fn on_mouse_down(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        self.moved = false;
        if let Some(grip) = self.handle_at(ctx, at) {
            self.grip = Some(grip);
            ctx.set_drag_pan(false);
        } else if ctx.hit(at).as_deref() == Some(self.feature.as_str()) {
            self.drag_from = Some(at);
            ctx.set_drag_pan(false);
        }
        Ok(())
    }

    fn on_drag(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        if let Some(grip) = self.grip {
            ctx.update_feature(&self.feature, |feature, config| {
                feature.drag_grip(grip, at, config)
            });
            self.moved = true;
        } else if let Some(from) = self.drag_from {
            if ctx.feature(&self.feature).is_some_and(|feature| feature.ranging) {
                log::debug!("ranging lines cannot be moved");
                return Ok(());
            }
            let delta = at.delta_from(&from);
            ctx.update_feature(&self.feature, |feature, config| {
                feature.translate(delta, config)
            });
            self.drag_from = Some(at);
            self.moved = true;
        }
        Ok(())
    }

    fn on_mouse_up(&mut self, ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        let action = match (self.grip.take(), self.drag_from.take()) {
            (Some(_), _) => "change_coordinates",
            (None, Some(_)) => "move",
            (None, None) => return Ok(()),
        };
        ctx.set_drag_pan(true);
        if std::mem::take(&mut self.moved) {
            if let Some(feature) = ctx.feature(&self.feature).cloned() {
                ctx.emit(DrawEventKind::Update, vec![feature], Some(action));
            }
            self.suppress_click = true;
        }
        Ok(())
    }

    fn on_click(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        if std::mem::take(&mut self.suppress_click) {
            return Ok(());
        }
        match ctx.hit(at) {
            None => ctx.change_mode(SIMPLE_SELECT, ModeOptions::default()),
            Some(other) if other != self.feature => {
                ctx.change_mode(SIMPLE_SELECT, ModeOptions::feature(other))
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn on_key_up(&mut self, ctx: &mut ModeContext<'_>, key: &str) -> Result<()> {
        if key == "Escape" || key == "Enter" {
            ctx.change_mode(SIMPLE_SELECT, ModeOptions::feature(self.feature.as_str()));
        }
        Ok(())
    }

    fn on_trash(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        ctx.delete_features(&[self.feature.clone()], false);
        ctx.change_mode(SIMPLE_SELECT, ModeOptions::default());
        Ok(())
    }

    fn display(&self, feature: &DrawFeature, selected: bool, out: &mut Vec<Feature>) {
        out.push(feature.display(selected));
        if feature.id == self.feature {
            for (path, at) in feature.handles() {
                out.push(vertex_display(&feature.id, path, at, false));
            }
        }
    }
}
