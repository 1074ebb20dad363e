use std::time::{Duration, Instant};

use turntable_core::{CenteringTransform, MaterialCatalog, MaterialConfig, PipelineConfig, UserOffset};
use turntable_export::SequenceName;
use turntable_geom::{
    bind_material, camera_transform, load, resolve_centering, Aabb, OrbitRig, SceneAsset,
};
use turntable_render::{validate_exposure, FrameImage, RenderSettings, Renderer};

use crate::{JobError, JobState};

/// Output frames are square.
const VIEWPORT_ASPECT: f32 = 1.0;

/// Interactive settings read at the start of each render.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub user_offset: UserOffset,
    pub brightness: f32,
    /// Catalog id of the selected material.
    pub material: String,
}

/// Summary of a loaded model for the tool's status line.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub triangles: usize,
    pub bounds: Aabb,
    pub centering: CenteringTransform,
}

struct LoadedModel {
    asset: SceneAsset,
    centering: CenteringTransform,
    rig: OrbitRig,
}

/// The loaded model, its one-time centering and the current controls.
pub struct Stage {
    config: PipelineConfig,
    model: Option<LoadedModel>,
    controls: Controls,
    state: JobState,
}

impl Stage {
    pub fn new(config: PipelineConfig) -> Result<Self, JobError> {
        config.validate()?;
        let controls = Controls {
            user_offset: UserOffset::ZERO,
            brightness: 1.0,
            material: config.materials.first().id.clone(),
        };
        Ok(Self {
            config,
            model: None,
            controls,
            state: JobState::Idle,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &MaterialCatalog {
        &self.config.materials
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings::from_config(&self.config)
    }

    /// One of `Idle`, `ModelLoaded`, `Centered` or `Failed`.
    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn asset(&self) -> Option<&SceneAsset> {
        self.model.as_ref().map(|m| &m.asset)
    }

    /// Parses model bytes and centers the result. A failure leaves no model loaded.
    pub fn load_model(&mut self, name: &str, bytes: &[u8]) -> Result<ModelInfo, JobError> {
        self.model = None;
        let asset = match load(bytes) {
            Ok(asset) => asset.with_name(name),
            Err(err) => return Err(self.fail(err.into())),
        };
        self.install(asset)
    }

    /// Stages an in-memory asset as if it had been loaded from a file.
    pub fn load_asset(&mut self, asset: SceneAsset) -> Result<ModelInfo, JobError> {
        self.model = None;
        self.install(asset)
    }

    fn install(&mut self, asset: SceneAsset) -> Result<ModelInfo, JobError> {
        self.state = JobState::ModelLoaded;
        let camera = &self.config.camera;
        let framed = resolve_centering(&asset, VIEWPORT_ASPECT, camera).and_then(|centering| {
            OrbitRig::frame(&asset.bounds(), camera, VIEWPORT_ASPECT).map(|rig| (centering, rig))
        });
        let (centering, rig) = match framed {
            Ok(framed) => framed,
            Err(err) => return Err(self.fail(err.into())),
        };

        let info = ModelInfo {
            name: asset.name().to_string(),
            triangles: asset.mesh().triangle_count(),
            bounds: asset.bounds(),
            centering,
        };
        self.model = Some(LoadedModel {
            asset,
            centering,
            rig,
        });
        self.state = JobState::Centered;
        tracing::info!(model = %info.name, triangles = info.triangles, "model centered");
        Ok(info)
    }

    fn fail(&mut self, err: JobError) -> JobError {
        tracing::warn!(error = %err, "model rejected");
        self.state = JobState::Failed(err.to_string());
        err
    }

    pub fn set_user_offset(&mut self, offset: UserOffset) -> Result<(), JobError> {
        if !offset.is_finite() {
            return Err(JobError::InvalidOffset {
                dx: offset.dx,
                dy: offset.dy,
            });
        }
        self.controls.user_offset = offset;
        Ok(())
    }

    pub fn set_brightness(&mut self, brightness: f32) -> Result<(), JobError> {
        validate_exposure(brightness).map_err(JobError::InvalidExposure)?;
        self.controls.brightness = brightness;
        Ok(())
    }

    pub fn select_material(&mut self, id: &str) -> Result<&MaterialConfig, JobError> {
        let material = self
            .config
            .materials
            .get(id)
            .ok_or_else(|| JobError::UnknownMaterial(id.to_string()))?;
        self.controls.material = material.id.clone();
        Ok(material)
    }

    fn selected_material(&self) -> Result<&MaterialConfig, JobError> {
        self.config
            .materials
            .get(&self.controls.material)
            .ok_or_else(|| JobError::UnknownMaterial(self.controls.material.clone()))
    }

    fn loaded(&self) -> Result<&LoadedModel, JobError> {
        self.model.as_ref().ok_or(JobError::NoModel)
    }

    /// Renders one still at `angle_deg` with the current controls.
    pub fn render_preview(&self, renderer: &mut Renderer, angle_deg: f32) -> Result<FrameImage, JobError> {
        let model = self.loaded()?;
        let material = self.selected_material()?;
        let mut asset = model.asset.clone();
        bind_material(&mut asset, &self.config.materials, material)?;

        let camera = camera_transform(&model.rig, angle_deg, &model.centering, &self.controls.user_offset);
        let deadline = Instant::now() + self.config.frame_timeout();
        renderer
            .render_frame(0, &asset, &camera, self.controls.brightness, Some(deadline))
            .map_err(|source| JobError::FrameRender { frame: 0, source })
    }

    /// Validates every input and freezes the current controls into a job.
    pub fn prepare_job(&self, product: &str, ring_type: &str) -> Result<RenderJob, JobError> {
        let model = self.loaded()?;
        validate_exposure(self.controls.brightness).map_err(JobError::InvalidExposure)?;
        let material = self.selected_material()?.clone();
        let name = SequenceName::for_product(product, ring_type, &material.slug)?;

        let mut asset = model.asset.clone();
        bind_material(&mut asset, &self.config.materials, &material)?;

        tracing::info!(
            sequence = %name,
            material = %material.id,
            frames = self.config.frame_count,
            "job prepared"
        );
        Ok(RenderJob {
            asset,
            catalog: self.config.materials.clone(),
            material,
            centering: model.centering,
            rig: model.rig,
            user_offset: self.controls.user_offset,
            frame_count: self.config.frame_count,
            brightness: self.controls.brightness,
            frame_timeout: self.config.frame_timeout(),
            name,
        })
    }
}

/// Everything one sequence needs, captured when the user hits Generate.
/// Later control changes do not reach it.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub(crate) asset: SceneAsset,
    pub(crate) catalog: MaterialCatalog,
    pub(crate) material: MaterialConfig,
    pub(crate) centering: CenteringTransform,
    pub(crate) rig: OrbitRig,
    pub(crate) user_offset: UserOffset,
    pub(crate) frame_count: u32,
    pub(crate) brightness: f32,
    pub(crate) frame_timeout: Duration,
    pub(crate) name: SequenceName,
}

impl RenderJob {
    pub fn name(&self) -> &SequenceName {
        &self.name
    }

    pub fn material(&self) -> &MaterialConfig {
        &self.material
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn user_offset(&self) -> UserOffset {
        self.user_offset
    }

    pub fn centering(&self) -> CenteringTransform {
        self.centering
    }

    /// Overrides the per-frame render budget.
    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }
}
