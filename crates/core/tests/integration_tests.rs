//! Integration tests for pallet-piler-core.

use approx::assert_relative_eq;
use nalgebra::Vector3;
use pallet_piler_core::{
    is_contained, overlaps, support_area, Box3, Deadline, Error, ImprovementBudget, OrderingKey,
    PackConfig, ProgressInfo, EXHAUSTIVE_ITEM_CAP,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod geometry_tests {
    use super::*;

    fn cube(x: f64, y: f64, z: f64, side: f64) -> Box3 {
        Box3::from_corner(x, y, z, side, side, side).unwrap()
    }

    #[test]
    fn test_touching_faces_do_not_overlap() {
        let a = cube(0.0, 0.0, 0.0, 50.0);
        assert!(!overlaps(&a, &cube(50.0, 0.0, 0.0, 50.0)));
        assert!(!overlaps(&a, &cube(0.0, 0.0, 50.0, 50.0)));
        assert!(overlaps(&a, &cube(49.0, 49.0, 49.0, 50.0)));
    }

    #[test]
    fn test_containment_includes_boundary() {
        let pallet = Box3::new(Vector3::zeros(), Vector3::new(100.0, 100.0, 150.0)).unwrap();
        assert!(is_contained(&cube(50.0, 50.0, 100.0, 50.0), &pallet));
        assert!(!is_contained(&cube(50.0, 60.0, 0.0, 50.0), &pallet));
    }

    #[test]
    fn test_support_from_two_neighbours() {
        let left = Box3::from_corner(0.0, 0.0, 0.0, 50.0, 100.0, 40.0).unwrap();
        let right = Box3::from_corner(50.0, 0.0, 0.0, 50.0, 100.0, 40.0).unwrap();
        let lower = Box3::from_corner(0.0, 0.0, 0.0, 100.0, 100.0, 30.0).unwrap();

        // Spans the seam between two level tops.
        let bridge = Box3::from_corner(25.0, 0.0, 40.0, 50.0, 100.0, 10.0).unwrap();
        assert_relative_eq!(support_area(&bridge, &[left, right]), 1.0);

        // Only tops level with the base count.
        assert_relative_eq!(support_area(&bridge, &[lower]), 0.0);
        assert_relative_eq!(support_area(&bridge, &[left]), 0.5);
    }

    #[test]
    fn test_floor_is_full_support() {
        assert_relative_eq!(support_area(&cube(10.0, 10.0, 0.0, 5.0), &[]), 1.0);
    }

    #[test]
    fn test_negative_extent_is_rejected() {
        assert!(matches!(
            Box3::from_corner(0.0, 0.0, 0.0, 10.0, -1.0, 10.0),
            Err(Error::InvalidGeometry { .. })
        ));
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PackConfig::default();
        assert_relative_eq!(config.min_support_fraction, 0.75);
        assert!(config.allow_multiple_pallets);
        assert_eq!(config.ordering_key, OrderingKey::VolumeDesc);
        assert!(config.improvement.is_enabled());
        assert_eq!(config.pallet_limit(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pallet_limit() {
        assert_eq!(PackConfig::new().with_max_pallets(3).pallet_limit(), Some(3));
        assert_eq!(
            PackConfig::new()
                .with_max_pallets(3)
                .with_multiple_pallets(false)
                .pallet_limit(),
            Some(1)
        );
    }

    #[test]
    fn test_exhaustive_threshold_is_capped() {
        let config = PackConfig::new().with_exhaustive_max_items(50);
        assert_eq!(config.exhaustive_threshold(), EXHAUSTIVE_ITEM_CAP);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let err = PackConfig::new()
            .with_min_support_fraction(1.5)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.is_intake_error());

        assert!(PackConfig::new().with_max_pallets(0).validate().is_err());
    }

    #[test]
    fn test_greedy_disables_improvement() {
        assert!(!PackConfig::greedy().improvement.is_enabled());
        assert!(!ImprovementBudget::disabled().is_enabled());
    }
}

mod deadline_tests {
    use super::*;

    #[test]
    fn test_cancellation_expires_deadline() {
        let flag = Arc::new(AtomicBool::new(false));
        let deadline = Deadline::new(0, Arc::clone(&flag));
        assert!(!deadline.expired());
        assert!(deadline.remaining().is_none());

        flag.store(true, Ordering::Relaxed);
        assert!(deadline.expired());
        assert!(deadline.tightened(1_000).expired());
    }

    #[test]
    fn test_tightened_keeps_earlier_limit() {
        let deadline = Deadline::new(50, Arc::new(AtomicBool::new(false)));
        let tight = deadline.tightened(60_000);
        assert!(tight.remaining().unwrap().as_millis() <= 50);
    }

    #[test]
    fn test_progress_info_builder() {
        let info = ProgressInfo::new()
            .with_phase("constructive")
            .with_items(3, 10)
            .with_pallets(1);
        assert_eq!(info.phase, "constructive");
        assert_eq!(info.items_placed, 3);
        assert!(info.running);
        assert!(!info.finished().running);
    }
}
