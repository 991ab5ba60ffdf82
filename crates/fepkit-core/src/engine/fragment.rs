use super::error::TopologyError;
use crate::core::models::template::Template;
use crate::core::models::terms::Bond;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// A declared equivalence between an atom of the initial state and an atom
/// of the final state whose PDB names differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtomLink {
    pub initial: String,
    pub final_name: String,
}

impl AtomLink {
    pub fn new(initial: impl Into<String>, final_name: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            final_name: final_name.into(),
        }
    }
}

/// How two terms on opposite end states were matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairKind {
    /// Matched by identical PDB names.
    Core,
    /// Matched through a declared atom link (the linker atoms themselves,
    /// their connecting bonds and the angles around those bonds).
    Linker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomPair {
    pub implicit: usize,
    pub explicit: usize,
    pub kind: PairKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondPair {
    pub implicit: (usize, usize),
    pub explicit: (usize, usize),
    pub kind: PairKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnglePair {
    pub implicit: (usize, usize, usize),
    pub explicit: (usize, usize, usize),
    pub kind: PairKind,
}

/// The outcome of comparing two end states.
///
/// Holds annotated copies of both templates (fragment and linker flags set)
/// together with every cross-state correspondence, keyed by the explicit
/// side. The templates handed to the detector are never modified.
#[derive(Debug, Clone)]
pub struct AlchemicalTopology {
    explicit: Template,
    implicit: Template,
    explicit_is_final: bool,
    atom_pairs: BTreeMap<usize, AtomPair>,
    bond_pairs: BTreeMap<(usize, usize), BondPair>,
    angle_pairs: BTreeMap<(usize, usize, usize), AnglePair>,
}

impl AlchemicalTopology {
    /// The end state holding every atom of both states.
    pub fn explicit(&self) -> &Template {
        &self.explicit
    }

    /// The end state whose extra atoms are represented as dummies.
    pub fn implicit(&self) -> &Template {
        &self.implicit
    }

    /// True when atoms are created along λ (the final state is the explicit one).
    pub fn explicit_is_final(&self) -> bool {
        self.explicit_is_final
    }

    pub fn initial(&self) -> &Template {
        if self.explicit_is_final {
            &self.implicit
        } else {
            &self.explicit
        }
    }

    pub fn final_state(&self) -> &Template {
        if self.explicit_is_final {
            &self.explicit
        } else {
            &self.implicit
        }
    }

    pub fn fragment_atom_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.explicit.fragment_atoms().map(|a| a.id)
    }

    pub fn atom_pair(&self, explicit_id: usize) -> Option<&AtomPair> {
        self.atom_pairs.get(&explicit_id)
    }

    pub fn bond_pair(&self, explicit_key: (usize, usize)) -> Option<&BondPair> {
        self.bond_pairs.get(&explicit_key)
    }

    pub fn angle_pair(&self, explicit_key: (usize, usize, usize)) -> Option<&AnglePair> {
        self.angle_pairs.get(&explicit_key)
    }

    pub fn atom_pairs(&self) -> impl Iterator<Item = &AtomPair> {
        self.atom_pairs.values()
    }

    pub fn bond_pairs(&self) -> impl Iterator<Item = &BondPair> {
        self.bond_pairs.values()
    }

    pub fn angle_pairs(&self) -> impl Iterator<Item = &AnglePair> {
        self.angle_pairs.values()
    }

    /// Bond pairs anchoring linker atoms to the core.
    pub fn connecting_bonds(&self) -> impl Iterator<Item = &BondPair> {
        self.bond_pairs
            .values()
            .filter(|pair| pair.kind == PairKind::Linker)
    }
}

/// Splits two end states into core, fragment and linker regions.
#[derive(Debug, Clone, Default)]
pub struct FragmentDetector {
    links: Vec<AtomLink>,
    pair_angles: bool,
}

impl FragmentDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_links(mut self, links: Vec<AtomLink>) -> Self {
        self.links = links;
        self
    }

    /// Also match the angles around each connecting bond.
    pub fn pair_angles(mut self, enabled: bool) -> Self {
        self.pair_angles = enabled;
        self
    }

    #[instrument(skip_all, name = "fragment_detection")]
    pub fn detect(
        &self,
        initial: &Template,
        final_state: &Template,
    ) -> Result<AlchemicalTopology, TopologyError> {
        self.validate_links(initial, final_state)?;

        let core_names: HashSet<&str> = initial
            .atom_names()
            .filter(|name| final_state.contains_name(name))
            .collect();
        let link_names: HashSet<&str> = self
            .links
            .iter()
            .flat_map(|l| [l.initial.as_str(), l.final_name.as_str()])
            .collect();

        let covered = |name: &str| core_names.contains(name) || link_names.contains(name);
        let initial_only: Vec<String> = initial
            .atom_names()
            .filter(|n| !covered(*n))
            .map(String::from)
            .collect();
        let final_only: Vec<String> = final_state
            .atom_names()
            .filter(|n| !covered(*n))
            .map(String::from)
            .collect();

        let (explicit, implicit, explicit_is_final) = if final_only.is_empty() {
            (initial, final_state, false)
        } else if initial_only.is_empty() {
            (final_state, initial, true)
        } else {
            return Err(TopologyError::Ambiguous {
                initial_only,
                final_only,
            });
        };
        info!(
            "Explicit end state is the {} template '{}'",
            if explicit_is_final { "final" } else { "initial" },
            explicit.name()
        );

        let fragment_ids: HashSet<usize> = explicit
            .atoms()
            .iter()
            .filter(|a| !core_names.contains(a.name()))
            .map(|a| a.id)
            .collect();
        debug!("Found {} fragment atoms", fragment_ids.len());

        let mut atom_pairs = BTreeMap::new();
        for name in &core_names {
            if let (Some(i), Some(e)) = (implicit.atom_by_name(name), explicit.atom_by_name(name)) {
                atom_pairs.insert(
                    e.id,
                    AtomPair {
                        implicit: i.id,
                        explicit: e.id,
                        kind: PairKind::Core,
                    },
                );
            }
        }

        let mut implicit_linkers = HashSet::new();
        let mut explicit_linkers = HashSet::new();
        let mut linker_pairs = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let (implicit_name, explicit_name) = if explicit_is_final {
                (&link.initial, &link.final_name)
            } else {
                (&link.final_name, &link.initial)
            };
            let i = implicit
                .find_atom(implicit_name)
                .map_err(|_| TopologyError::UnknownLinkerAtom {
                    name: implicit_name.clone(),
                    state: "implicit",
                })?;
            let e = explicit
                .find_atom(explicit_name)
                .map_err(|_| TopologyError::UnknownLinkerAtom {
                    name: explicit_name.clone(),
                    state: "explicit",
                })?;
            implicit_linkers.insert(i.id);
            explicit_linkers.insert(e.id);
            let pair = AtomPair {
                implicit: i.id,
                explicit: e.id,
                kind: PairKind::Linker,
            };
            atom_pairs.insert(e.id, pair);
            linker_pairs.push(pair);
        }

        let explicit = explicit.annotated(&fragment_ids, &explicit_linkers);
        let implicit = implicit.annotated(&HashSet::new(), &implicit_linkers);

        let mut bond_pairs = BTreeMap::new();
        for bond in explicit.bonds() {
            let (Some(a), Some(b)) = (explicit.atom(bond.atom1), explicit.atom(bond.atom2)) else {
                continue;
            };
            if !core_names.contains(a.name()) || !core_names.contains(b.name())
            {
                continue;
            }
            if let Some(partner) = implicit.bond_between_names(a.name(), b.name()) {
                bond_pairs.insert(
                    bond.key(),
                    BondPair {
                        implicit: partner.key(),
                        explicit: bond.key(),
                        kind: PairKind::Core,
                    },
                );
            }
        }

        let mut connecting = Vec::with_capacity(linker_pairs.len());
        for pair in &linker_pairs {
            let implicit_bond = connecting_bond(&implicit, pair.implicit, &core_names)?;
            let explicit_bond = connecting_bond(&explicit, pair.explicit, &core_names)?;
            let bond_pair = BondPair {
                implicit: implicit_bond.key(),
                explicit: explicit_bond.key(),
                kind: PairKind::Linker,
            };
            bond_pairs.insert(explicit_bond.key(), bond_pair);
            connecting.push((*pair, implicit_bond, explicit_bond));
        }

        let mut angle_pairs = core_angle_pairs(&explicit, &implicit, &core_names);
        if self.pair_angles {
            for (pair, implicit_bond, explicit_bond) in &connecting {
                let linker_name = explicit
                    .atom(pair.explicit)
                    .map(|a| a.name().to_string())
                    .unwrap_or_default();
                let pairs = linker_angle_pairs(
                    &implicit,
                    implicit_bond,
                    &explicit,
                    explicit_bond,
                    &core_names,
                    linker_name,
                )?;
                for angle_pair in pairs {
                    angle_pairs.insert(angle_pair.explicit, angle_pair);
                }
            }
        }

        debug!(
            "Paired {} atoms, {} bonds and {} angles across end states",
            atom_pairs.len(),
            bond_pairs.len(),
            angle_pairs.len()
        );

        Ok(AlchemicalTopology {
            explicit,
            implicit,
            explicit_is_final,
            atom_pairs,
            bond_pairs,
            angle_pairs,
        })
    }

    fn validate_links(&self, initial: &Template, final_state: &Template) -> Result<(), TopologyError> {
        for link in &self.links {
            if link.initial.is_empty() || link.final_name.is_empty() || link.initial == link.final_name {
                return Err(TopologyError::InvalidLinkerPair {
                    initial: link.initial.clone(),
                    final_name: link.final_name.clone(),
                });
            }
            if !initial.contains_name(&link.initial) {
                return Err(TopologyError::UnknownLinkerAtom {
                    name: link.initial.clone(),
                    state: "initial",
                });
            }
            if !final_state.contains_name(&link.final_name) {
                return Err(TopologyError::UnknownLinkerAtom {
                    name: link.final_name.clone(),
                    state: "final",
                });
            }
        }
        Ok(())
    }
}

fn is_core(template: &Template, id: usize, core_names: &HashSet<&str>) -> bool {
    template
        .atom(id)
        .is_some_and(|a| core_names.contains(a.name()))
}

/// The bond joining a linker atom to a core neighbour.
fn connecting_bond(
    template: &Template,
    linker_id: usize,
    core_names: &HashSet<&str>,
) -> Result<Bond, TopologyError> {
    let candidates: Vec<Bond> = template
        .bonds_of(linker_id)
        .filter(|b| {
            b.partner_of(linker_id)
                .is_some_and(|partner| is_core(template, partner, core_names))
        })
        .copied()
        .collect();

    let linker_name = || {
        template
            .atom(linker_id)
            .map(|a| a.name().to_string())
            .unwrap_or_default()
    };

    match candidates.as_slice() {
        [] => Err(TopologyError::MissingConnectingBond {
            atom: linker_name(),
            template: template.name().to_string(),
        }),
        [only] => Ok(*only),
        [first, ..] => {
            warn!(
                "Linker atom '{}' in template '{}' has {} bonds to core atoms; using {:?}",
                linker_name(),
                template.name(),
                candidates.len(),
                first.key()
            );
            Ok(*first)
        }
    }
}

fn angle_by_names(template: &Template, names: [&str; 3]) -> Option<(usize, usize, usize)> {
    let ids = [
        template.atom_by_name(names[0])?.id,
        template.atom_by_name(names[1])?.id,
        template.atom_by_name(names[2])?.id,
    ];
    let forward = (ids[0], ids[1], ids[2]);
    let reverse = (ids[2], ids[1], ids[0]);
    template
        .angle(forward)
        .or_else(|| template.angle(reverse))
        .map(|a| a.key())
}

fn core_angle_pairs(
    explicit: &Template,
    implicit: &Template,
    core_names: &HashSet<&str>,
) -> BTreeMap<(usize, usize, usize), AnglePair> {
    let mut pairs = BTreeMap::new();
    for angle in explicit.angles() {
        if !angle.atoms().iter().all(|&id| is_core(explicit, id, core_names)) {
            continue;
        }
        let names = angle
            .atoms()
            .map(|id| explicit.atom(id).map(|a| a.name()).unwrap_or(""));
        if let Some(partner) = angle_by_names(implicit, names) {
            pairs.insert(
                angle.key(),
                AnglePair {
                    implicit: partner,
                    explicit: angle.key(),
                    kind: PairKind::Core,
                },
            );
        }
    }
    pairs
}

/// Angles spanning `bond` whose third atom is a core atom, keyed by that
/// atom's PDB name.
fn angles_around(
    template: &Template,
    bond: &Bond,
    core_names: &HashSet<&str>,
) -> HashMap<String, (usize, usize, usize)> {
    template
        .angles()
        .iter()
        .filter_map(|angle| {
            let third = angle.third_atom(bond)?;
            let atom = template.atom(third)?;
            core_names
                .contains(atom.name())
                .then(|| (atom.name().to_string(), angle.key()))
        })
        .collect()
}

fn linker_angle_pairs(
    implicit: &Template,
    implicit_bond: &Bond,
    explicit: &Template,
    explicit_bond: &Bond,
    core_names: &HashSet<&str>,
    linker_name: String,
) -> Result<Vec<AnglePair>, TopologyError> {
    let implicit_angles = angles_around(implicit, implicit_bond, core_names);
    let explicit_angles = angles_around(explicit, explicit_bond, core_names);

    let mismatch = || {
        let mut implicit_names: Vec<String> = implicit_angles.keys().cloned().collect();
        let mut explicit_names: Vec<String> = explicit_angles.keys().cloned().collect();
        implicit_names.sort();
        explicit_names.sort();
        TopologyError::MismatchedAngleTopology {
            atom: linker_name.clone(),
            implicit: implicit_names,
            explicit: explicit_names,
        }
    };

    if implicit_angles.len() != explicit_angles.len() {
        return Err(mismatch());
    }

    let mut pairs = Vec::with_capacity(explicit_angles.len());
    for (name, &explicit_key) in &explicit_angles {
        let &implicit_key = implicit_angles.get(name).ok_or_else(mismatch)?;
        pairs.push(AnglePair {
            implicit: implicit_key,
            explicit: explicit_key,
            kind: PairKind::Linker,
        });
    }
    Ok(pairs)
}
