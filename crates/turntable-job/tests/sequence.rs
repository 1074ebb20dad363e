use turntable_core::{PipelineConfig, UserOffset};
use turntable_geom::{SceneAsset, TriMesh};
use turntable_job::{CancelToken, JobOutcome, JobRun, JobState, RenderSlot, Stage};
use turntable_render::Renderer;

fn ring_blank() -> SceneAsset {
    // Octahedron raised off the turntable plane.
    let positions = vec![
        [1.0, 2.0, 0.0],
        [-1.0, 2.0, 0.0],
        [0.0, 3.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 2.0, 1.0],
        [0.0, 2.0, -1.0],
    ];
    let indices = vec![
        0, 2, 4, 2, 1, 4, 1, 3, 4, 3, 0, 4, 2, 0, 5, 1, 2, 5, 3, 1, 5, 0, 3, 5,
    ];
    SceneAsset::from_mesh(
        "blank",
        TriMesh {
            positions,
            normals: Vec::new(),
            indices,
        },
    )
    .unwrap()
}

fn stage() -> (Stage, RenderSlot) {
    let config = PipelineConfig {
        resolution: 12,
        supersample: 1,
        ..PipelineConfig::default()
    };
    let mut stage = Stage::new(config).unwrap();
    stage.load_asset(ring_blank()).unwrap();
    let slot = RenderSlot::new(Renderer::new(stage.render_settings()));
    (stage, slot)
}

#[test]
fn full_turn_produces_a_complete_archive() {
    let (mut stage, slot) = stage();
    stage.select_material("18k-rose-gold").unwrap();
    stage.set_user_offset(UserOffset::new(0.05, 0.0)).unwrap();
    let job = stage.prepare_job("doji_diamond", "ring").unwrap();

    let run = JobRun::new(job, slot.try_lease().unwrap(), CancelToken::new());
    let mut progress = Vec::new();
    let JobOutcome::Complete(archive) = run.run(|frame| progress.push(frame.index)).unwrap() else {
        panic!("job did not complete");
    };

    assert_eq!(progress, (0..36).collect::<Vec<_>>());
    assert_eq!(archive.name().to_string(), "doji_diamond_ring-rose-gold-sequence");
    assert_eq!(archive.frame_count(), 36);
    let viewer = archive.viewer_config();
    assert_eq!(viewer.image_count, 36);
    assert_eq!(viewer.material, "rose-gold");

    let tar = archive.write_tar(Vec::new()).unwrap();
    assert!(!tar.is_empty());
    assert!(!slot.is_busy());
}

#[test]
fn cancelling_after_frame_ten_leaves_no_archive() {
    let (stage, slot) = stage();
    let job = stage.prepare_job("doji_diamond", "ring").unwrap();
    let cancel = CancelToken::new();

    let mut run = JobRun::new(job, slot.try_lease().unwrap(), cancel.clone());
    while run.state() != &(JobState::Rendering { frame: 10 }) {
        run.step().unwrap();
    }
    assert_eq!(run.frames_rendered(), 11);
    assert!(matches!(slot.try_lease(), Err(turntable_job::JobError::Busy)));

    cancel.cancel();
    assert_eq!(run.step().unwrap(), &JobState::Cancelled);
    assert_eq!(run.frames_rendered(), 0);
    assert!(run.archive().is_none());
    assert!(run.into_archive().is_none());
    assert!(!slot.is_busy());
}

#[test]
fn cancel_through_run_returns_cancelled() {
    let (stage, slot) = stage();
    let job = stage.prepare_job("band", "").unwrap();
    let cancel = CancelToken::new();
    let run = JobRun::new(job, slot.try_lease().unwrap(), cancel.clone());
    let outcome = run
        .run(|frame| {
            if frame.index == 10 {
                cancel.cancel();
            }
        })
        .unwrap();
    assert!(matches!(outcome, JobOutcome::Cancelled));
}
