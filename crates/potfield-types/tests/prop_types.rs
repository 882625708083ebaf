// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Property-Based Tests (proptest) for potfield-types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for potfield-types using proptest.
//!
//! Covers: damping schedule monotonicity, prism geometry, suggested meshes,
//! property-set resolution.

use potfield_types::config::{
    DampingSchedule, DataType, InversionRequest, MeshConfig, PropertySet, SurveyDimension,
};
use potfield_types::state::Prism;
use proptest::prelude::*;

// ── Damping Schedule ─────────────────────────────────────────────────

proptest! {
    /// Damping never increases and never drops below its floor.
    #[test]
    fn damping_non_increasing_and_floored(
        initial in 1e-8f64..1.0,
        factor in 0.05f64..1.0,
        minimum in 0.0f64..1e-3,
        steps in 1usize..60,
    ) {
        let schedule = DampingSchedule { initial, factor, minimum };
        let mut current = initial.max(minimum);
        for _ in 0..steps {
            let next = schedule.next(current);
            prop_assert!(next <= current + 1e-18,
                "damping increased: {} -> {}", current, next);
            prop_assert!(next >= minimum);
            current = next;
        }
    }
}

// ── Prism Geometry ───────────────────────────────────────────────────

proptest! {
    /// Volume is the product of the sizes and the centre lies inside.
    #[test]
    fn prism_volume_and_center(
        x0 in -1000.0f64..1000.0,
        y0 in -1000.0f64..1000.0,
        z0 in 0.0f64..500.0,
        dx in 0.1f64..100.0,
        dy in 0.1f64..100.0,
        dz in 0.1f64..100.0,
    ) {
        let p = Prism::new([x0, x0 + dx], [y0, y0 + dy], [z0, z0 + dz]);
        prop_assert!((p.volume() - dx * dy * dz).abs() < 1e-9 * dx * dy * dz + 1e-12);
        let c = p.center();
        prop_assert!(c[0] > x0 && c[0] < x0 + dx);
        prop_assert!(c[1] > y0 && c[1] < y0 + dy);
        prop_assert!(c[2] > z0 && c[2] < z0 + dz);
        prop_assert!((p.mid_depth() - c[2]).abs() < 1e-12);
    }
}

// ── Suggested Meshes ─────────────────────────────────────────────────

proptest! {
    /// A suggested line mesh covers the profile and allows splitting in x and z.
    #[test]
    fn suggested_line_mesh_covers_profile(
        start in -5000.0f64..5000.0,
        length in 1.0f64..10000.0,
        n in 3usize..200,
    ) {
        let x: Vec<f64> = (0..n).map(|i| start + length * i as f64 / (n - 1) as f64).collect();
        let mesh = MeshConfig::suggest_for_line(&x).unwrap();

        prop_assert_eq!(mesh.dimension, SurveyDimension::Line);
        prop_assert!(mesh.bounds.xmin < start);
        prop_assert!(mesh.bounds.xmax > start + length);
        prop_assert!(mesh.cell_size.x > 0.0);
        prop_assert!(mesh.min_cell_size.x < mesh.cell_size.x);
        prop_assert!(mesh.min_cell_size.z < mesh.cell_size.z);
        prop_assert!((mesh.bounds.zmax - mesh.cell_size.z).abs() < 1e-9 * mesh.cell_size.z);
    }

    /// A suggested grid mesh is square in plan and one layer deep.
    #[test]
    fn suggested_grid_mesh_is_square(
        lx in 10.0f64..5000.0,
        ly in 10.0f64..5000.0,
    ) {
        let x = vec![0.0, lx];
        let y = vec![0.0, ly];
        let mesh = MeshConfig::suggest_for_grid(&x, &y).unwrap();

        prop_assert_eq!(mesh.cell_size.x, mesh.cell_size.y);
        prop_assert!(mesh.cell_size.x > 0.0);
        prop_assert!(mesh.bounds.ymin < 0.0 && mesh.bounds.ymax > ly);
        prop_assert!((mesh.cell_size.z - lx.max(ly) / 10.0).abs() < 1e-9);
    }
}

// ── Property Selection ───────────────────────────────────────────────

proptest! {
    /// Resolution never yields both magnetic properties, and gravity data
    /// always resolves to density.
    #[test]
    fn resolution_is_exclusive(
        susceptibility in any::<bool>(),
        remanence in any::<bool>(),
        density in any::<bool>(),
    ) {
        let req = InversionRequest { susceptibility, remanence, density };

        let mag = req.resolve(DataType::Magnetic);
        prop_assert_eq!(mag.n_properties(), 1);
        prop_assert_eq!(mag.data_type(), DataType::Magnetic);
        if remanence {
            prop_assert_eq!(mag, PropertySet::Remanence);
        } else {
            prop_assert_eq!(mag, PropertySet::Susceptibility);
        }

        prop_assert_eq!(req.resolve(DataType::Gravity), PropertySet::Density);
    }
}
