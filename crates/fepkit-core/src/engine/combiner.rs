use super::fragment::AlchemicalTopology;
use crate::core::lambda::Lambda;
use crate::core::models::atom::NonbondedParams;
use crate::core::models::template::Template;
use crate::core::models::terms::Bond;
use tracing::trace;

/// Nonbonded parameters standing in for an atom that does not exist.
pub const DUMMY_NONBONDED: NonbondedParams = NonbondedParams {
    sigma: 0.0,
    epsilon: 0.0,
    charge: 0.0,
    sgb_radius: 0.0,
    radius_type: 0.0,
    sgb_gamma: 0.0,
    sgb_type: 0.0,
};
/// Equilibrium length (Å) of a bond that does not exist.
pub const DUMMY_BOND_EQ_DIST: f64 = 0.1;
/// Spring constant of a bond that does not exist.
pub const DUMMY_BOND_SPRING: f64 = 0.0;
/// Spring constant of an angle that does not exist.
pub const DUMMY_ANGLE_SPRING: f64 = 0.0;

/// Which bonded terms follow λ. By default connecting geometry stays fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BondedInterpolation {
    pub bonds: bool,
    pub angles: bool,
}

/// Linear interpolation oriented so that λ = 0 gives the initial state and
/// λ = 1 the final state, whichever side is explicit.
///
/// Equal values are returned unchanged so untouched parameters survive a
/// write/read cycle bit for bit.
pub fn blend(implicit_value: f64, explicit_value: f64, lambda: f64, explicit_is_final: bool) -> f64 {
    if implicit_value == explicit_value {
        return explicit_value;
    }
    let (initial, final_value) = if explicit_is_final {
        (implicit_value, explicit_value)
    } else {
        (explicit_value, implicit_value)
    };
    initial * (1.0 - lambda) + final_value * lambda
}

/// Produces interpolated templates for an [`AlchemicalTopology`].
///
/// Every call returns a fresh [`Template`]; the topology and its end states
/// are only read, so one combiner can serve many λ values concurrently.
#[derive(Debug, Clone, Copy)]
pub struct ParameterCombiner<'a> {
    topology: &'a AlchemicalTopology,
    bonded: BondedInterpolation,
}

impl<'a> ParameterCombiner<'a> {
    pub fn new(topology: &'a AlchemicalTopology) -> Self {
        Self {
            topology,
            bonded: BondedInterpolation::default(),
        }
    }

    pub fn with_bonded(mut self, bonded: BondedInterpolation) -> Self {
        self.bonded = bonded;
        self
    }

    pub fn topology(&self) -> &'a AlchemicalTopology {
        self.topology
    }

    pub fn blend(&self, implicit_value: f64, explicit_value: f64, lambda: f64) -> f64 {
        blend(
            implicit_value,
            explicit_value,
            lambda,
            self.topology.explicit_is_final(),
        )
    }

    /// Interpolates the explicit end state at `lambda`.
    pub fn combine(&self, lambda: &Lambda) -> Template {
        self.apply(self.topology.explicit(), lambda, self.bonded)
    }

    /// Interpolates at `lambda` with the other channel first set to
    /// `constant`. Bonded terms follow whichever of the two is steric.
    pub fn combine_with_constant(&self, lambda: &Lambda, constant: Option<&Lambda>) -> Template {
        match constant {
            Some(constant) => {
                let base = self.apply(self.topology.explicit(), constant, self.bonded);
                self.apply(&base, lambda, self.bonded)
            }
            None => self.combine(lambda),
        }
    }

    fn apply(&self, base: &Template, lambda: &Lambda, bonded: BondedInterpolation) -> Template {
        let topology = self.topology;
        let explicit = topology.explicit();
        let implicit = topology.implicit();
        let x = lambda.value();
        let channel = lambda.channel();
        trace!("Combining {} onto template '{}'", lambda, base.name());

        let mut result = base.clone();
        // Bonded geometry moves with the steric part of the perturbation.
        let bonded = if channel.affects_sterics() {
            bonded
        } else {
            BondedInterpolation::default()
        };

        for atom in explicit.atoms() {
            let from = match topology.atom_pair(atom.id) {
                Some(pair) => implicit.atom(pair.implicit).map(|a| a.nonbonded),
                None if atom.is_fragment => Some(DUMMY_NONBONDED),
                None => None,
            };
            let (Some(from), Some(target)) = (from, result.atom_mut(atom.id)) else {
                continue;
            };
            let to = atom.nonbonded;
            let nb = &mut target.nonbonded;

            if channel.affects_sterics() {
                nb.sigma = self.blend(from.sigma, to.sigma, x);
                nb.epsilon = self.blend(from.epsilon, to.epsilon, x);
                nb.sgb_radius = self.blend(from.sgb_radius, to.sgb_radius, x);
                nb.sgb_gamma = self.blend(from.sgb_gamma, to.sgb_gamma, x);
            }
            if channel.affects_charges() {
                nb.charge = self.blend(from.charge, to.charge, x);
            }
        }

        if bonded.bonds {
            for bond in explicit.bonds() {
                let from = match topology.bond_pair(bond.key()) {
                    Some(pair) => implicit.bond(pair.implicit).map(|b| (b.spring, b.eq_dist)),
                    None if bond.is_fragment => Some((DUMMY_BOND_SPRING, DUMMY_BOND_EQ_DIST)),
                    None => None,
                };
                let (Some((spring, eq_dist)), Some(target)) = (from, result.bond_mut(bond.key()))
                else {
                    continue;
                };
                target.spring = self.blend(spring, bond.spring, x);
                target.eq_dist = self.blend(eq_dist, bond.eq_dist, x);
            }
        }

        if bonded.angles {
            for angle in explicit.angles() {
                let paired = topology
                    .angle_pair(angle.key())
                    .and_then(|pair| implicit.angle(pair.implicit));
                let Some(target) = result.angle_mut(angle.key()) else {
                    continue;
                };
                match paired {
                    Some(partner) => {
                        target.spring = self.blend(partner.spring, angle.spring, x);
                        target.eq_angle = self.blend(partner.eq_angle, angle.eq_angle, x);
                    }
                    None if angle.is_fragment => {
                        target.spring = self.blend(DUMMY_ANGLE_SPRING, angle.spring, x);
                    }
                    None => {}
                }
            }
        }

        result
    }
}

/// The two ends of a bond, split for geometric re-minimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondEnds {
    pub fixed: usize,
    pub moving: usize,
}

/// Holds fixed the end of `bond` that is closer to the core, following the
/// z-matrix tree of `template`. Ties keep `atom1` fixed.
pub fn reminimization_ends(template: &Template, bond: &Bond) -> Option<BondEnds> {
    let ends = |fixed, moving| Some(BondEnds { fixed, moving });
    match (
        template.distance_to_core(bond.atom1),
        template.distance_to_core(bond.atom2),
    ) {
        (Some(d1), Some(d2)) if d2 < d1 => ends(bond.atom2, bond.atom1),
        (Some(_), _) => ends(bond.atom1, bond.atom2),
        (None, Some(_)) => ends(bond.atom2, bond.atom1),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lambda::Channel;
    use crate::engine::fragment::tests::{ethyl_initial, growth_topology, propyl_final};
    use crate::engine::fragment::{AtomLink, FragmentDetector};

    const TOL: f64 = 1e-12;

    fn lambda(value: f64, channel: Channel) -> Lambda {
        Lambda::new(value, channel).unwrap()
    }

    fn charge(template: &Template, name: &str) -> f64 {
        template.atom_by_name(name).unwrap().nonbonded.charge
    }

    fn sigma(template: &Template, name: &str) -> f64 {
        template.atom_by_name(name).unwrap().nonbonded.sigma
    }

    #[test]
    fn lambda_zero_reproduces_initial_state() {
        let topology = growth_topology(false);
        let result = ParameterCombiner::new(&topology).combine(&lambda(0.0, Channel::Dual));

        assert_eq!(charge(&result, "_C1_"), -0.2);
        assert_eq!(charge(&result, "_C2_"), 0.1);
        assert_eq!(charge(&result, "_C4_"), 0.1);
        assert_eq!(sigma(&result, "_C4_"), 2.5);
        assert_eq!(charge(&result, "_H5_"), 0.0);
        assert_eq!(sigma(&result, "_H5_"), 0.0);
    }

    #[test]
    fn lambda_one_reproduces_final_state() {
        let topology = growth_topology(false);
        let result = ParameterCombiner::new(&topology).combine(&lambda(1.0, Channel::Dual));

        for atom in propyl_final().atoms() {
            assert_eq!(
                result.atom(atom.id).unwrap().nonbonded,
                atom.nonbonded,
                "atom {}",
                atom.pdb_name
            );
        }
    }

    #[test]
    fn paired_parameters_follow_the_affine_law() {
        let topology = growth_topology(false);
        let combiner = ParameterCombiner::new(&topology);
        for x in [0.1, 0.25, 0.5, 0.9] {
            let result = combiner.combine(&lambda(x, Channel::Dual));
            let expected_c2 = (1.0 - x) * 0.1 + x * -0.12;
            let expected_h5 = x * 0.06;
            assert!((charge(&result, "_C2_") - expected_c2).abs() < TOL);
            assert!((charge(&result, "_H5_") - expected_h5).abs() < TOL);
            assert!((sigma(&result, "_C4_") - ((1.0 - x) * 2.5 + x * 3.5)).abs() < TOL);
        }
    }

    #[test]
    fn orientation_does_not_change_the_endpoints() {
        let topology = FragmentDetector::new()
            .with_links(vec![AtomLink::new("_C4_", "_H3_")])
            .detect(&propyl_final(), &ethyl_initial())
            .unwrap();
        let combiner = ParameterCombiner::new(&topology);

        let start = combiner.combine(&lambda(0.0, Channel::Dual));
        let end = combiner.combine(&lambda(1.0, Channel::Dual));

        assert_eq!(charge(&start, "_H5_"), 0.06);
        assert_eq!(charge(&end, "_H5_"), 0.0);
        assert_eq!(charge(&end, "_C4_"), 0.1);
        assert_eq!(charge(&end, "_C2_"), 0.1);
    }

    #[test]
    fn steric_channel_leaves_charges_alone() {
        let topology = growth_topology(false);
        let result = ParameterCombiner::new(&topology).combine(&lambda(0.0, Channel::Steric));

        assert_eq!(sigma(&result, "_H5_"), 0.0);
        assert_eq!(charge(&result, "_H5_"), 0.06);
        assert_eq!(charge(&result, "_C2_"), -0.12);
    }

    #[test]
    fn coulombic_channel_leaves_sterics_alone() {
        let topology = growth_topology(false);
        let result = ParameterCombiner::new(&topology).combine(&lambda(0.0, Channel::Coulombic));

        assert_eq!(charge(&result, "_H5_"), 0.0);
        assert_eq!(sigma(&result, "_H5_"), 2.5);
    }

    #[test]
    fn constant_lambda_is_applied_before_the_scheduled_one() {
        let topology = growth_topology(false);
        let combiner = ParameterCombiner::new(&topology);
        let constant = lambda(0.0, Channel::Coulombic);

        let result = combiner.combine_with_constant(&lambda(0.5, Channel::Steric), Some(&constant));

        assert_eq!(charge(&result, "_H5_"), 0.0);
        assert!((sigma(&result, "_H5_") - 1.25).abs() < TOL);
    }

    #[test]
    fn bonded_terms_are_untouched_unless_requested() {
        let topology = growth_topology(true);
        let result = ParameterCombiner::new(&topology).combine(&lambda(0.0, Channel::Dual));
        assert_eq!(result.bonds(), topology.explicit().bonds());
        assert_eq!(result.angles(), topology.explicit().angles());
    }

    #[test]
    fn bonds_blend_with_partner_or_dummy() {
        let topology = growth_topology(false);
        let result = ParameterCombiner::new(&topology)
            .with_bonded(BondedInterpolation {
                bonds: true,
                angles: false,
            })
            .combine(&lambda(0.0, Channel::Dual));

        let connecting = result.bond((2, 3)).unwrap();
        assert_eq!((connecting.spring, connecting.eq_dist), (340.0, 1.09));
        let vanishing = result.bond((3, 4)).unwrap();
        assert_eq!(
            (vanishing.spring, vanishing.eq_dist),
            (DUMMY_BOND_SPRING, DUMMY_BOND_EQ_DIST)
        );
        assert_eq!(result.bond((1, 2)).unwrap().eq_dist, 1.529);
    }

    #[test]
    fn angles_blend_with_paired_partner_or_dummy_spring() {
        let topology = growth_topology(true);
        let result = ParameterCombiner::new(&topology)
            .with_bonded(BondedInterpolation {
                bonds: false,
                angles: true,
            })
            .combine(&lambda(0.0, Channel::Dual));

        let paired = result.angle((1, 2, 3)).unwrap();
        assert_eq!((paired.spring, paired.eq_angle), (37.5, 110.7));
        let vanishing = result.angle((2, 3, 4)).unwrap();
        assert_eq!(vanishing.spring, DUMMY_ANGLE_SPRING);
        assert_eq!(vanishing.eq_angle, 110.7);
    }

    #[test]
    fn coulombic_channel_leaves_bonded_terms_alone() {
        let topology = growth_topology(true);
        let result = ParameterCombiner::new(&topology)
            .with_bonded(BondedInterpolation {
                bonds: true,
                angles: true,
            })
            .combine(&lambda(0.0, Channel::Coulombic));

        assert_eq!(result.bonds(), topology.explicit().bonds());
        assert_eq!(result.angles(), topology.explicit().angles());
    }

    #[test]
    fn staged_bonds_stay_continuous_across_stages() {
        let topology = growth_topology(false);
        let combiner = ParameterCombiner::new(&topology).with_bonded(BondedInterpolation {
            bonds: true,
            angles: false,
        });

        let end_of_steric = combiner.combine_with_constant(
            &lambda(1.0, Channel::Steric),
            Some(&lambda(0.0, Channel::Coulombic)),
        );
        let start_of_coulombic = combiner.combine_with_constant(
            &lambda(0.05, Channel::Coulombic),
            Some(&lambda(1.0, Channel::Steric)),
        );

        assert_eq!(end_of_steric.bonds(), start_of_coulombic.bonds());
        assert_eq!(start_of_coulombic.bonds(), topology.explicit().bonds());
        assert_eq!(sigma(&start_of_coulombic, "_H5_"), 2.5);

        let early_steric = combiner.combine_with_constant(
            &lambda(0.05, Channel::Steric),
            Some(&lambda(0.0, Channel::Coulombic)),
        );
        let fading = early_steric.bond((3, 4)).unwrap();
        assert!(fading.eq_dist < topology.explicit().bond((3, 4)).unwrap().eq_dist);
    }

    #[test]
    fn combining_never_mutates_the_topology() {
        let topology = growth_topology(true);
        let before = topology.explicit().clone();
        let combiner = ParameterCombiner::new(&topology).with_bonded(BondedInterpolation {
            bonds: true,
            angles: true,
        });

        let first = combiner.combine(&lambda(0.3, Channel::Dual));
        let _ = combiner.combine(&lambda(0.7, Channel::Dual));
        let again = combiner.combine(&lambda(0.3, Channel::Dual));

        assert_eq!(topology.explicit(), &before);
        assert_eq!(first, again);
    }

    #[test]
    fn reminimization_holds_the_end_nearer_the_core() {
        let topology = growth_topology(false);
        let explicit = topology.explicit();

        let outer = *explicit.bond((3, 4)).unwrap();
        assert_eq!(
            reminimization_ends(explicit, &outer),
            Some(BondEnds { fixed: 3, moving: 4 })
        );

        let reversed = Bond::new(4, 3, 0.0, 0.0);
        assert_eq!(
            reminimization_ends(explicit, &reversed),
            Some(BondEnds { fixed: 3, moving: 4 })
        );

        let core = *explicit.bond((1, 2)).unwrap();
        assert_eq!(
            reminimization_ends(explicit, &core),
            Some(BondEnds { fixed: 1, moving: 2 })
        );
    }
}
