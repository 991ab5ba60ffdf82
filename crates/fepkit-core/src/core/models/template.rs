use super::atom::{Atom, NonbondedParams};
use super::terms::{Angle, Bond, Dihedral};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_HEADER_LINES: [&str; 2] = ["* LIGAND DATABASE FILE (OPLS2005)", "*"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("PDB atom name '{name}' appears more than once in template '{template}'")]
    DuplicateAtomName { template: String, name: String },
    #[error("Atom ids must be contiguous from 1: expected id {expected}, found {found}")]
    NonContiguousIds { expected: usize, found: usize },
    #[error("{section} record references atom id {id}, which is not defined in the template")]
    UnknownAtomReference { section: &'static str, id: usize },
    #[error("PDB atom name '{name}' not found in template '{template}'")]
    UnknownAtomName { template: String, name: String },
}

/// The five counts stored on the template name line.
///
/// They are engine bookkeeping and are written back exactly as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderCounts {
    pub nonbonded: i64,
    pub bonds: i64,
    pub angles: i64,
    pub dihedrals: i64,
    pub non_null: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateHeader {
    /// Free-text lines preceding the name line, kept verbatim.
    pub comment_lines: Vec<String>,
    /// Residue name of the template (at most 5 characters).
    pub name: String,
    pub counts: HeaderCounts,
}

impl TemplateHeader {
    pub fn new(name: &str) -> Self {
        Self {
            comment_lines: DEFAULT_HEADER_LINES.iter().map(|s| s.to_string()).collect(),
            name: name.to_string(),
            counts: HeaderCounts::default(),
        }
    }
}

/// An in-memory force-field template.
///
/// A `Template` is a value: the public API is read-only, and the only way to
/// obtain a modified template is to build a new one (through
/// [`TemplateBuilder`] or the combiner, which works on a private copy).
/// Atoms live in a dense arena where `atoms[i].id == i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    header: TemplateHeader,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    angles: Vec<Angle>,
    propers: Vec<Dihedral>,
    impropers: Vec<Dihedral>,
    name_index: HashMap<String, usize>,
    bond_index: HashMap<(usize, usize), usize>,
    angle_index: HashMap<(usize, usize, usize), usize>,
}

impl Template {
    pub fn header(&self) -> &TemplateHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// File name used when no explicit output path is given.
    pub fn default_output_name(&self) -> String {
        format!("{}z", self.header.name.to_lowercase())
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn atom(&self, id: usize) -> Option<&Atom> {
        id.checked_sub(1).and_then(|idx| self.atoms.get(idx))
    }

    pub fn atom_by_name(&self, pdb_name: &str) -> Option<&Atom> {
        self.name_index.get(pdb_name.trim()).and_then(|&id| self.atom(id))
    }

    /// Like [`Template::atom_by_name`], but a missing name is an error.
    pub fn find_atom(&self, pdb_name: &str) -> Result<&Atom, TemplateError> {
        self.atom_by_name(pdb_name)
            .ok_or_else(|| TemplateError::UnknownAtomName {
                template: self.header.name.clone(),
                name: pdb_name.to_string(),
            })
    }

    pub fn contains_name(&self, pdb_name: &str) -> bool {
        self.name_index.contains_key(pdb_name.trim())
    }

    pub fn atom_names(&self) -> impl Iterator<Item = &str> {
        self.atoms.iter().map(Atom::name)
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn bond(&self, key: (usize, usize)) -> Option<&Bond> {
        self.bond_index.get(&key).map(|&idx| &self.bonds[idx])
    }

    /// Bonds touching the given atom, in insertion order.
    pub fn bonds_of(&self, atom_id: usize) -> impl Iterator<Item = &Bond> {
        self.bonds.iter().filter(move |b| b.contains(atom_id))
    }

    /// Finds the bond joining two atoms given by PDB name, in either order.
    pub fn bond_between_names(&self, name1: &str, name2: &str) -> Option<&Bond> {
        let id1 = self.atom_by_name(name1)?.id;
        let id2 = self.atom_by_name(name2)?.id;
        self.bond((id1, id2)).or_else(|| self.bond((id2, id1)))
    }

    pub fn angles(&self) -> &[Angle] {
        &self.angles
    }

    pub fn angle(&self, key: (usize, usize, usize)) -> Option<&Angle> {
        self.angle_index.get(&key).map(|&idx| &self.angles[idx])
    }

    pub fn proper_dihedrals(&self) -> &[Dihedral] {
        &self.propers
    }

    pub fn improper_dihedrals(&self) -> &[Dihedral] {
        &self.impropers
    }

    pub fn fragment_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter().filter(|a| a.is_fragment)
    }

    pub fn fragment_bonds(&self) -> impl Iterator<Item = &Bond> {
        self.bonds.iter().filter(|b| b.is_fragment)
    }

    pub fn fragment_angles(&self) -> impl Iterator<Item = &Angle> {
        self.angles.iter().filter(|a| a.is_fragment)
    }

    pub fn fragment_dihedrals(&self) -> impl Iterator<Item = &Dihedral> {
        self.propers
            .iter()
            .chain(self.impropers.iter())
            .filter(|d| d.is_fragment)
    }

    /// Number of parent/child edges between `atom_id` and the closest
    /// non-fragment atom, following the z-matrix tree.
    ///
    /// Returns `Some(0)` for a core atom and `None` when the atom is unknown
    /// or no core atom is reachable.
    pub fn distance_to_core(&self, atom_id: usize) -> Option<usize> {
        self.atom(atom_id)?;
        let adjacency = self.tree_adjacency();

        let mut visited = vec![false; self.atoms.len() + 1];
        let mut queue = VecDeque::from([(atom_id, 0usize)]);
        visited[atom_id] = true;

        while let Some((current, distance)) = queue.pop_front() {
            if !self.atoms[current - 1].is_fragment {
                return Some(distance);
            }
            for &next in &adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back((next, distance + 1));
                }
            }
        }
        None
    }

    /// Undirected parent/child adjacency, indexed by atom id (slot 0 unused).
    fn tree_adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.atoms.len() + 1];
        for atom in &self.atoms {
            if atom.parent_id != 0 && atom.parent_id <= self.atoms.len() {
                adjacency[atom.id].push(atom.parent_id);
                adjacency[atom.parent_id].push(atom.id);
            }
        }
        adjacency
    }

    /// Returns a copy with fragment and linker flags set from the given ids.
    ///
    /// Bonds, angles and dihedrals are flagged when they reference at least
    /// one fragment atom.
    pub(crate) fn annotated(
        &self,
        fragment_atoms: &HashSet<usize>,
        linker_atoms: &HashSet<usize>,
    ) -> Template {
        let mut copy = self.clone();
        for atom in &mut copy.atoms {
            atom.is_fragment = fragment_atoms.contains(&atom.id);
            atom.is_linker = linker_atoms.contains(&atom.id);
        }
        for bond in &mut copy.bonds {
            bond.is_fragment = [bond.atom1, bond.atom2]
                .iter()
                .any(|id| fragment_atoms.contains(id));
        }
        for angle in &mut copy.angles {
            angle.is_fragment = angle.atoms().iter().any(|id| fragment_atoms.contains(id));
        }
        for dihedral in copy.propers.iter_mut().chain(copy.impropers.iter_mut()) {
            dihedral.is_fragment = dihedral
                .atom_ids()
                .iter()
                .any(|id| fragment_atoms.contains(id));
        }
        copy
    }

    pub(crate) fn atom_mut(&mut self, id: usize) -> Option<&mut Atom> {
        id.checked_sub(1).and_then(|idx| self.atoms.get_mut(idx))
    }

    pub(crate) fn bond_mut(&mut self, key: (usize, usize)) -> Option<&mut Bond> {
        let idx = *self.bond_index.get(&key)?;
        self.bonds.get_mut(idx)
    }

    pub(crate) fn angle_mut(&mut self, key: (usize, usize, usize)) -> Option<&mut Angle> {
        let idx = *self.angle_index.get(&key)?;
        self.angles.get_mut(idx)
    }
}

/// Incrementally assembles a [`Template`] and checks its invariants on `build`.
#[derive(Debug, Default)]
pub struct TemplateBuilder {
    header: Option<TemplateHeader>,
    atoms: Vec<Atom>,
    nonbonded: Vec<(usize, NonbondedParams)>,
    bonds: Vec<Bond>,
    angles: Vec<Angle>,
    dihedrals: Vec<Dihedral>,
}

impl TemplateBuilder {
    pub fn new(header: TemplateHeader) -> Self {
        Self {
            header: Some(header),
            ..Default::default()
        }
    }

    pub fn add_atom(&mut self, atom: Atom) -> &mut Self {
        self.atoms.push(atom);
        self
    }

    pub fn set_nonbonded(&mut self, atom_id: usize, params: NonbondedParams) -> &mut Self {
        self.nonbonded.push((atom_id, params));
        self
    }

    pub fn add_bond(&mut self, bond: Bond) -> &mut Self {
        self.bonds.push(bond);
        self
    }

    pub fn add_angle(&mut self, angle: Angle) -> &mut Self {
        self.angles.push(angle);
        self
    }

    pub fn add_dihedral(&mut self, dihedral: Dihedral) -> &mut Self {
        self.dihedrals.push(dihedral);
        self
    }

    pub fn build(self) -> Result<Template, TemplateError> {
        let header = self
            .header
            .unwrap_or_else(|| TemplateHeader::new("UNK"));

        let mut atoms = self.atoms;
        atoms.sort_by_key(|a| a.id);
        for (idx, atom) in atoms.iter().enumerate() {
            if atom.id != idx + 1 {
                return Err(TemplateError::NonContiguousIds {
                    expected: idx + 1,
                    found: atom.id,
                });
            }
        }

        let mut name_index = HashMap::with_capacity(atoms.len());
        for atom in &atoms {
            if name_index.insert(atom.name().to_string(), atom.id).is_some() {
                return Err(TemplateError::DuplicateAtomName {
                    template: header.name.clone(),
                    name: atom.name().to_string(),
                });
            }
        }

        let n = atoms.len();
        let check = |section: &'static str, id: usize| {
            if id == 0 || id > n {
                Err(TemplateError::UnknownAtomReference { section, id })
            } else {
                Ok(())
            }
        };

        for (id, params) in self.nonbonded {
            check("NBON", id)?;
            atoms[id - 1].nonbonded = params;
        }

        let mut bonds = Vec::with_capacity(self.bonds.len());
        let mut bond_index = HashMap::with_capacity(self.bonds.len());
        for bond in self.bonds {
            check("BOND", bond.atom1)?;
            check("BOND", bond.atom2)?;
            if bond_index.contains_key(&bond.key()) {
                debug!("Ignoring repeated bond record {:?}", bond.key());
                continue;
            }
            bond_index.insert(bond.key(), bonds.len());
            bonds.push(bond);
        }

        let mut angles = Vec::with_capacity(self.angles.len());
        let mut angle_index = HashMap::with_capacity(self.angles.len());
        for angle in self.angles {
            for id in angle.atoms() {
                check("THET", id)?;
            }
            if angle_index.contains_key(&angle.key()) {
                debug!("Ignoring repeated angle record {:?}", angle.key());
                continue;
            }
            angle_index.insert(angle.key(), angles.len());
            angles.push(angle);
        }

        let mut propers = Vec::new();
        let mut impropers = Vec::new();
        for dihedral in self.dihedrals {
            let section = if dihedral.improper { "IPHI" } else { "PHI" };
            for id in dihedral.atom_ids() {
                check(section, id)?;
            }
            if dihedral.improper {
                impropers.push(dihedral);
            } else {
                propers.push(dihedral);
            }
        }

        Ok(Template {
            header,
            atoms,
            bonds,
            angles,
            propers,
            impropers,
            name_index,
            bond_index,
            angle_index,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A small chain C1-C2-C3 with a hydrogen H1 on C3.
    pub(crate) fn chain_template(name: &str, names: &[&str]) -> Template {
        let mut builder = TemplateBuilder::new(TemplateHeader::new(name));
        for (idx, pdb_name) in names.iter().enumerate() {
            let id = idx + 1;
            builder.add_atom(Atom::new(id, idx, "CT", pdb_name));
            builder.set_nonbonded(
                id,
                NonbondedParams {
                    sigma: 3.0 + id as f64 * 0.1,
                    epsilon: 0.05 * id as f64,
                    charge: -0.1 * id as f64,
                    sgb_radius: 1.5 + id as f64 * 0.01,
                    radius_type: 1.0,
                    sgb_gamma: 0.005 * id as f64,
                    sgb_type: 0.0,
                },
            );
        }
        for id in 1..names.len() {
            builder.add_bond(Bond::new(id, id + 1, 300.0 + id as f64, 1.5 + id as f64 * 0.01));
        }
        for id in 1..names.len().saturating_sub(1) {
            builder.add_angle(Angle::new(id, id + 1, id + 2, 50.0 + id as f64, 109.5));
        }
        builder.build().unwrap()
    }

    /// Builds a template from `(name, parent, charge, sigma)` atoms, with
    /// epsilon and the solvent radius derived from sigma.
    pub(crate) fn build_template(
        name: &str,
        atoms: &[(&str, usize, f64, f64)],
        bonds: &[(usize, usize, f64, f64)],
        angles: &[(usize, usize, usize, f64, f64)],
    ) -> Template {
        let mut builder = TemplateBuilder::new(TemplateHeader::new(name));
        for (idx, &(pdb_name, parent, charge, sigma)) in atoms.iter().enumerate() {
            builder.add_atom(Atom::new(idx + 1, parent, "CT", pdb_name));
            builder.set_nonbonded(
                idx + 1,
                NonbondedParams {
                    sigma,
                    epsilon: sigma / 10.0,
                    charge,
                    sgb_radius: sigma / 2.0,
                    radius_type: 1.0,
                    sgb_gamma: 0.005,
                    sgb_type: 0.0,
                },
            );
        }
        for &(a, b, spring, eq_dist) in bonds {
            builder.add_bond(Bond::new(a, b, spring, eq_dist));
        }
        for &(a, b, c, spring, eq_angle) in angles {
            builder.add_angle(Angle::new(a, b, c, spring, eq_angle));
        }
        builder.build().unwrap()
    }

    #[test]
    fn build_rejects_non_contiguous_ids() {
        let mut builder = TemplateBuilder::new(TemplateHeader::new("LIG"));
        builder.add_atom(Atom::new(1, 0, "CT", "_C1_"));
        builder.add_atom(Atom::new(3, 1, "CT", "_C2_"));
        assert_eq!(
            builder.build().unwrap_err(),
            TemplateError::NonContiguousIds {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn build_rejects_duplicate_pdb_names() {
        let mut builder = TemplateBuilder::new(TemplateHeader::new("LIG"));
        builder.add_atom(Atom::new(1, 0, "CT", "_C1_"));
        builder.add_atom(Atom::new(2, 1, "CT", "_C1_"));
        assert!(matches!(
            builder.build(),
            Err(TemplateError::DuplicateAtomName { name, .. }) if name == "_C1_"
        ));
    }

    #[test]
    fn build_rejects_bond_to_unknown_atom() {
        let mut builder = TemplateBuilder::new(TemplateHeader::new("LIG"));
        builder.add_atom(Atom::new(1, 0, "CT", "_C1_"));
        builder.add_bond(Bond::new(1, 2, 300.0, 1.5));
        assert_eq!(
            builder.build().unwrap_err(),
            TemplateError::UnknownAtomReference {
                section: "BOND",
                id: 2
            }
        );
    }

    #[test]
    fn build_keeps_first_of_repeated_bonds() {
        let mut builder = TemplateBuilder::new(TemplateHeader::new("LIG"));
        builder.add_atom(Atom::new(1, 0, "CT", "_C1_"));
        builder.add_atom(Atom::new(2, 1, "CT", "_C2_"));
        builder.add_bond(Bond::new(1, 2, 300.0, 1.5));
        builder.add_bond(Bond::new(1, 2, 100.0, 1.0));
        let template = builder.build().unwrap();
        assert_eq!(template.bonds().len(), 1);
        assert_eq!(template.bond((1, 2)).unwrap().spring, 300.0);
    }

    #[test]
    fn lookups_by_name_and_id_agree() {
        let template = chain_template("LIG", &["_C1_", "_C2_", "_C3_"]);
        assert_eq!(template.atom_by_name("_C2_").unwrap().id, 2);
        assert_eq!(template.atom(3).unwrap().pdb_name, "_C3_");
        assert!(template.atom(0).is_none());
        assert!(template.atom(4).is_none());
        assert!(matches!(
            template.find_atom("_XX_"),
            Err(TemplateError::UnknownAtomName { .. })
        ));
    }

    #[test]
    fn bond_between_names_ignores_order() {
        let template = chain_template("LIG", &["_C1_", "_C2_", "_C3_"]);
        assert_eq!(
            template.bond_between_names("_C3_", "_C2_").unwrap().key(),
            (2, 3)
        );
        assert!(template.bond_between_names("_C1_", "_C3_").is_none());
    }

    #[test]
    fn annotated_returns_flagged_copy_without_touching_original() {
        let template = chain_template("LIG", &["_C1_", "_C2_", "_C3_"]);
        let annotated = template.annotated(&HashSet::from([3]), &HashSet::from([2]));

        assert!(template.fragment_atoms().next().is_none());
        assert_eq!(annotated.fragment_atoms().map(|a| a.id).collect::<Vec<_>>(), vec![3]);
        assert!(annotated.atom(2).unwrap().is_linker);
        assert_eq!(
            annotated.fragment_bonds().map(|b| b.key()).collect::<Vec<_>>(),
            vec![(2, 3)]
        );
        assert_eq!(annotated.fragment_angles().count(), 1);
    }

    #[test]
    fn fragment_dihedrals_cover_propers_and_impropers() {
        let mut builder = TemplateBuilder::new(TemplateHeader::new("LIG"));
        for (idx, name) in ["_C1_", "_C2_", "_C3_", "_C4_", "_H5_"].iter().enumerate() {
            builder.add_atom(Atom::new(idx + 1, idx, "CT", name));
        }
        builder
            .add_dihedral(Dihedral::new([1, 2, 3, 4], 0.5, 1.0, 3.0, false))
            .add_dihedral(Dihedral::new([2, 3, 4, -5], 0.3, 1.0, 3.0, false))
            .add_dihedral(Dihedral::new([1, 3, 2, -4], 2.5, -1.0, 2.0, true))
            .add_dihedral(Dihedral::new([3, 5, 4, -2], 2.5, -1.0, 2.0, true));
        let template = builder.build().unwrap();
        let annotated = template.annotated(&HashSet::from([5]), &HashSet::new());

        let fragment: Vec<_> = annotated.fragment_dihedrals().map(|d| d.atoms).collect();
        assert_eq!(fragment, vec![[2, 3, 4, -5], [3, 5, 4, -2]]);
        assert!(
            annotated
                .fragment_dihedrals()
                .all(|d| d.atom_ids().contains(&5))
        );
        assert_eq!(template.fragment_dihedrals().count(), 0);
    }

    #[test]
    fn distance_to_core_follows_parent_tree() {
        let template = chain_template("LIG", &["_C1_", "_C2_", "_C3_", "_C4_"]);
        let annotated = template.annotated(&HashSet::from([3, 4]), &HashSet::new());
        assert_eq!(annotated.distance_to_core(1), Some(0));
        assert_eq!(annotated.distance_to_core(3), Some(1));
        assert_eq!(annotated.distance_to_core(4), Some(2));
        assert_eq!(annotated.distance_to_core(9), None);
    }

    #[test]
    fn distance_to_core_is_none_when_everything_is_fragment() {
        let template = chain_template("LIG", &["_C1_", "_C2_"]);
        let annotated = template.annotated(&HashSet::from([1, 2]), &HashSet::new());
        assert_eq!(annotated.distance_to_core(2), None);
    }

    #[test]
    fn default_output_name_is_lowercase_with_suffix() {
        let template = chain_template("LIG", &["_C1_"]);
        assert_eq!(template.default_output_name(), "ligz");
    }
}
