use crate::{
    core::geo::LngLat,
    data::geojson::{Feature, Geometry},
    plugins::{
        base::{DrawMode, ModeContext, ModeOptions},
        draw::{
            feature::{vertex_display, DrawFeature},
            modes::{DIRECT_SELECT, SIMPLE_SELECT},
            DrawEventKind,
        },
    },
    Result,
};

/// Selects, moves and deletes whole features
#[derive(Debug, Default)]
pub struct SimpleSelectMode {
    initial: Vec<String>,
    drag_from: Option<LngLat>,
    moved: bool,
    suppress_click: bool,
}

impl SimpleSelectMode {
    pub fn new(options: &ModeOptions) -> Self {
        Self {
            initial: options.feature_ids.clone(),
            ..Self::default()
        }
    }
}

impl DrawMode for SimpleSelectMode {
    fn name(&self) -> &str {
        SIMPLE_SELECT
    }

    fn on_setup(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        ctx.select(std::mem::take(&mut self.initial));
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        if self.drag_from.take().is_some() {
            ctx.set_drag_pan(true);
        }
        Ok(())
    }

    fn on_mouse_down(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        let grabbed = ctx.hit(at).filter(|id| ctx.store().is_selected(id));
        if grabbed.is_some() {
            self.drag_from = Some(at);
            self.moved = false;
            ctx.set_drag_pan(false);
        }
        Ok(())
    }

    fn on_drag(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        let Some(from) = self.drag_from else {
            return Ok(());
        };
        let selected = ctx.selected_ids();
        if selected
            .iter()
            .any(|id| ctx.feature(id).is_some_and(|feature| feature.ranging))
        {
            log::debug!("ranging lines cannot be moved");
            return Ok(());
        }
        let delta = at.delta_from(&from);
        for id in &selected {
            ctx.update_feature(id, |feature, config| feature.translate(delta, config));
        }
        self.drag_from = Some(at);
        self.moved = true;
        Ok(())
    }

    fn on_mouse_up(&mut self, ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        if self.drag_from.take().is_none() {
            return Ok(());
        }
        ctx.set_drag_pan(true);
        if std::mem::take(&mut self.moved) {
            let features = ctx.store().selected().into_iter().cloned().collect();
            ctx.emit(DrawEventKind::Update, features, Some("move"));
            self.suppress_click = true;
        }
        Ok(())
    }

    fn on_click(&mut self, ctx: &mut ModeContext<'_>, at: LngLat) -> Result<()> {
        if std::mem::take(&mut self.suppress_click) {
            return Ok(());
        }
        match ctx.hit(at) {
            None => ctx.select(Vec::new()),
            Some(id) if ctx.store().is_selected(&id) => {
                let is_point = ctx
                    .feature(&id)
                    .is_some_and(|feature| matches!(feature.geometry, Geometry::Point { .. }));
                if !is_point {
                    ctx.change_mode(DIRECT_SELECT, ModeOptions::feature(id));
                }
            }
            Some(id) => ctx.select(vec![id]),
        }
        Ok(())
    }

    fn on_trash(&mut self, ctx: &mut ModeContext<'_>) -> Result<()> {
        let selected = ctx.selected_ids();
        ctx.delete_features(&selected, false);
        Ok(())
    }

    fn display(&self, feature: &DrawFeature, selected: bool, out: &mut Vec<Feature>) {
        out.push(feature.display(selected));
        if selected && !matches!(feature.geometry, Geometry::Point { .. }) {
            for (path, at) in feature.handles() {
                out.push(vertex_display(&feature.id, path, at, false));
            }
        }
    }
}
