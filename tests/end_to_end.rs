//! End-to-end: ideal clusters on a known helix, through fit → derivatives →
//! record emission. Residuals must vanish, derivatives must be finite, and
//! the run artifacts (record stream, steering file, constraint table,
//! diagnostics) must come out consistent.

mod common;

use camino::Utf8PathBuf;
use helifit::fitter::helical::HelicalFitter;
use helifit::fitter::{FitMode, FitterParams};
use helifit::seeds::EventSeeds;
use helifit::Subdetector;

fn temp_path(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap().join(name)
}

#[test]
fn ideal_silicon_helix_gives_zero_residuals() {
    let params = common::reference_helix();
    let (registry, store, seed) = common::silicon_event(&params);

    let data = temp_path("helifit_e2e_silicon.bin");
    let steering = temp_path("helifit_e2e_silicon.steer");
    let constraints = temp_path("helifit_e2e_silicon_constraints.txt");
    let diagnostics = temp_path("helifit_e2e_silicon_diag.csv");

    let config = FitterParams::builder()
        .fit_mode(FitMode::SiliconOnly)
        .data_path(data.clone())
        .steering_path(steering.clone())
        .constraint_path(constraints.clone())
        .diagnostics_path(diagnostics.clone())
        .build()
        .unwrap();

    let mut fitter = HelicalFitter::new(config).unwrap();
    let seeds = EventSeeds {
        silicon: vec![seed],
        tpc: vec![],
    };

    let summary = fitter.process_event(&seeds, &registry, &store).unwrap();
    assert_eq!(summary.tracks_seen, 1);
    assert_eq!(summary.tracks_accepted, 1);
    // three pixel clusters contribute two coordinates each, the two strip
    // clusters only their local x
    assert_eq!(summary.records_written, 8);

    let states = fitter.alignment_states().get(&0).unwrap().clone();
    assert_eq!(states.len(), 5);
    for state in &states {
        assert!(state.residual.x.abs() < 1e-6, "residual {}", state.residual.x);
        assert!(state.residual.y.abs() < 1e-6, "residual {}", state.residual.y);
        assert!(state.local.iter().all(|d| d.is_finite()));
        assert!(state.global.iter().all(|d| d.is_finite()));
    }

    let track = fitter.tracks().get(&0).unwrap().clone();
    assert_eq!(track.states.len(), 5);
    assert!((track.params.radius - params.radius).abs() / params.radius < 1e-6);

    let outputs = fitter.finish().unwrap();
    assert_eq!(outputs.alignment_states.len(), 1);
    assert_eq!(outputs.tracks.len(), 1);
    // one constraint per strip alignment group, two strip layers hit
    assert_eq!(outputs.constraints_written, 2);

    // artifacts on disk
    assert!(std::fs::metadata(&data).unwrap().len() > 0);
    assert_eq!(
        std::fs::read_to_string(&steering).unwrap().trim(),
        data.as_str()
    );
    let constraint_text = std::fs::read_to_string(&constraints).unwrap();
    assert_eq!(constraint_text.matches("Constraint 0.0").count(), 2);
    // header plus one diagnostics row per cluster
    let diag_text = std::fs::read_to_string(&diagnostics).unwrap();
    assert_eq!(diag_text.lines().count(), 6);

    for path in [&data, &steering, &constraints, &diagnostics] {
        std::fs::remove_file(path).ok();
    }
}

#[test]
fn ten_centimeter_helix_behaves_like_the_reference() {
    // tighter curl through the silicon barrel
    let params = helifit::HelixParams {
        radius: 10.0,
        x0: 11.0,
        y0: 0.0,
        zslope: -0.6,
        z0: 1.2,
    };
    let (registry, store, seed) = common::silicon_event(&params);

    let config = FitterParams::builder()
        .data_path(temp_path("helifit_e2e_r10.bin"))
        .steering_path(temp_path("helifit_e2e_r10.steer"))
        .constraint_path(temp_path("helifit_e2e_r10_constraints.txt"))
        .build()
        .unwrap();

    let mut fitter = HelicalFitter::new(config).unwrap();
    let seeds = EventSeeds {
        silicon: vec![seed],
        tpc: vec![],
    };

    let summary = fitter.process_event(&seeds, &registry, &store).unwrap();
    assert_eq!(summary.tracks_accepted, 1);

    let states = fitter.alignment_states().get(&0).unwrap();
    for state in states {
        assert!(state.residual.norm() < 1e-6);
        assert!(state.local.iter().all(|d| d.is_finite()));
        assert!(state.global.iter().all(|d| d.is_finite()));
    }
    let track = fitter.tracks().get(&0).unwrap();
    assert!((track.params.radius - 10.0).abs() < 1e-4);

    fitter.finish().unwrap();
    for name in [
        "helifit_e2e_r10.bin",
        "helifit_e2e_r10.steer",
        "helifit_e2e_r10_constraints.txt",
    ] {
        std::fs::remove_file(temp_path(name)).ok();
    }
}

#[test]
fn constraint_registration_is_idempotent_across_events() {
    let params = common::reference_helix();
    let (registry, store, seed) = common::silicon_event(&params);

    let config = FitterParams::builder()
        .data_path(temp_path("helifit_e2e_idem.bin"))
        .steering_path(temp_path("helifit_e2e_idem.steer"))
        .constraint_path(temp_path("helifit_e2e_idem_constraints.txt"))
        .build()
        .unwrap();

    let mut fitter = HelicalFitter::new(config).unwrap();
    let seeds = EventSeeds {
        silicon: vec![seed],
        tpc: vec![],
    };

    fitter.process_event(&seeds, &registry, &store).unwrap();
    fitter.process_event(&seeds, &registry, &store).unwrap();
    fitter.process_event(&seeds, &registry, &store).unwrap();

    let outputs = fitter.finish().unwrap();
    assert_eq!(outputs.constraints_written, 2);

    for name in [
        "helifit_e2e_idem.bin",
        "helifit_e2e_idem.steer",
        "helifit_e2e_idem_constraints.txt",
    ] {
        std::fs::remove_file(temp_path(name)).ok();
    }
}

#[test]
fn tpc_fit_passes_the_cluster_count_gate() {
    let params = common::reference_helix();
    let masked = [7u8, 22, 23, 38, 39];
    let (registry, store, seed) = common::tpc_event(&params, &masked);
    let n_clusters = seed.cluster_keys.len();
    assert!(n_clusters >= 35);

    let config = FitterParams::builder()
        .fit_mode(FitMode::TpcOnly)
        .data_path(temp_path("helifit_e2e_tpc.bin"))
        .steering_path(temp_path("helifit_e2e_tpc.steer"))
        .constraint_path(temp_path("helifit_e2e_tpc_constraints.txt"))
        .build()
        .unwrap();

    let mut fitter = HelicalFitter::new(config).unwrap();
    let seeds = EventSeeds {
        silicon: vec![],
        tpc: vec![seed],
    };

    let summary = fitter.process_event(&seeds, &registry, &store).unwrap();
    assert_eq!(summary.tracks_accepted, 1);
    // TPC clusters contribute both coordinates
    assert_eq!(summary.records_written, 2 * n_clusters);

    let states = fitter.alignment_states().get(&0).unwrap();
    assert_eq!(states.len(), n_clusters);
    for state in states {
        assert!(state.residual.norm() < 1e-6);
        assert_eq!(state.cluster_key.subdetector(), Subdetector::Tpc);
    }

    fitter.finish().unwrap();
    for name in [
        "helifit_e2e_tpc.bin",
        "helifit_e2e_tpc.steer",
        "helifit_e2e_tpc_constraints.txt",
    ] {
        std::fs::remove_file(temp_path(name)).ok();
    }
}

#[test]
fn full_track_mode_associates_silicon_clusters() {
    let params = common::reference_helix();
    let masked = [7u8, 22, 23, 38, 39];
    let (mut registry, mut store, tpc_seed) = common::tpc_event(&params, &masked);
    let n_tpc = tpc_seed.cluster_keys.len();

    // silicon clusters exist in the containers but not on the seed; the
    // full-track refit must pick them up by proximity to the helix
    let (silicon_registry, silicon_store, silicon_seed) = common::silicon_event(&params);
    for key in &silicon_seed.cluster_keys {
        use helifit::geometry::{SurfaceProvider, TransformKind};
        let surface = silicon_registry.surface(key, TransformKind::Ideal).unwrap();
        registry.insert_ideal(*key, surface.transform);
        use helifit::clusters::ClusterProvider;
        store.insert(*key, silicon_store.cluster(key).unwrap().clone());
    }

    let config = FitterParams::builder()
        .fit_mode(FitMode::FullTrack)
        .data_path(temp_path("helifit_e2e_full.bin"))
        .steering_path(temp_path("helifit_e2e_full.steer"))
        .constraint_path(temp_path("helifit_e2e_full_constraints.txt"))
        .build()
        .unwrap();

    let mut fitter = HelicalFitter::new(config).unwrap();
    let seeds = EventSeeds {
        silicon: vec![],
        tpc: vec![tpc_seed],
    };

    let summary = fitter.process_event(&seeds, &registry, &store).unwrap();
    assert_eq!(summary.tracks_accepted, 1);

    let states = fitter.alignment_states().get(&0).unwrap();
    assert_eq!(states.len(), n_tpc + 5);
    let n_silicon = states
        .iter()
        .filter(|s| s.cluster_key.is_silicon())
        .count();
    assert_eq!(n_silicon, 5);

    let outputs = fitter.finish().unwrap();
    // the associated strip clusters register their constraints
    assert_eq!(outputs.constraints_written, 2);

    for name in [
        "helifit_e2e_full.bin",
        "helifit_e2e_full.steer",
        "helifit_e2e_full_constraints.txt",
    ] {
        std::fs::remove_file(temp_path(name)).ok();
    }
}

#[test]
fn fixed_parameters_leave_persisted_states_unmasked() {
    let params = common::reference_helix();
    let (registry, store, seed) = common::silicon_event(&params);

    let config = FitterParams::builder()
        .fixed_layer(0)
        .fixed_layer_param(1, 3)
        .data_path(temp_path("helifit_e2e_fixed.bin"))
        .steering_path(temp_path("helifit_e2e_fixed.steer"))
        .constraint_path(temp_path("helifit_e2e_fixed_constraints.txt"))
        .build()
        .unwrap();

    let mut fitter = HelicalFitter::new(config).unwrap();
    let seeds = EventSeeds {
        silicon: vec![seed],
        tpc: vec![],
    };
    fitter.process_event(&seeds, &registry, &store).unwrap();

    // the persisted alignment states keep the full derivative matrices;
    // masking applies only to the emitted records
    let states = fitter.alignment_states().get(&0).unwrap();
    let layer0 = states.iter().find(|s| s.cluster_key.layer == 0).unwrap();
    assert!(layer0.global.iter().any(|d| *d != 0.0));

    fitter.finish().unwrap();
    for name in [
        "helifit_e2e_fixed.bin",
        "helifit_e2e_fixed.steer",
        "helifit_e2e_fixed_constraints.txt",
    ] {
        std::fs::remove_file(temp_path(name)).ok();
    }
}
