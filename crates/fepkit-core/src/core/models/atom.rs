use std::fmt;
use std::str::FromStr;

/// Nonbonded parameters carried by every template atom.
///
/// These are the scalar fields of the `NBON` section. The first four plus
/// the solvent gamma are the ones blended by the parameter combiner; the two
/// `*_type` columns are engine flags stored as floats and are only ever
/// copied through.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NonbondedParams {
    /// Lennard-Jones sigma in Angstroms.
    pub sigma: f64,
    /// Lennard-Jones well depth in kcal/mol.
    pub epsilon: f64,
    /// Partial charge in elementary charge units.
    pub charge: f64,
    /// Implicit-solvent (SGB) nonpolar radius.
    pub sgb_radius: f64,
    /// Implicit-solvent radius type flag.
    pub radius_type: f64,
    /// Implicit-solvent nonpolar gamma.
    pub sgb_gamma: f64,
    /// Implicit-solvent nonpolar type flag.
    pub sgb_type: f64,
}

/// The tree-location flag of a template atom (`M`ain chain or `S`ide chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AtomLocation {
    #[default]
    Main,
    Side,
}

impl AtomLocation {
    pub fn as_char(self) -> char {
        match self {
            AtomLocation::Main => 'M',
            AtomLocation::Side => 'S',
        }
    }
}

impl FromStr for AtomLocation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" | "m" => Ok(AtomLocation::Main),
            "S" | "s" => Ok(AtomLocation::Side),
            _ => Err(()),
        }
    }
}

impl fmt::Display for AtomLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A single atom of a force-field template.
///
/// Atoms are stored in a dense arena inside [`Template`](super::template::Template)
/// and are addressed by their 1-based `id`. The `parent_id` encodes the
/// z-matrix tree (0 marks the root).
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// 1-based atom id, contiguous within a template.
    pub id: usize,
    /// Id of the z-matrix parent, or 0 for the root atom.
    pub parent_id: usize,
    /// Main/side tree location flag.
    pub location: AtomLocation,
    /// Force-field atom type (e.g. "CT", "HC").
    pub atom_type: String,
    /// Four-character PDB atom name as it appears in the template columns,
    /// padding included (e.g. "_C1_" or " C1 ").
    pub pdb_name: String,
    /// Engine-specific integer column kept verbatim.
    pub extra: i64,
    /// Z-matrix internal coordinates (bond length, angle, dihedral).
    pub zmatrix: [f64; 3],
    /// Nonbonded parameters from the `NBON` section.
    pub nonbonded: NonbondedParams,
    /// True when the atom only exists in this end state.
    pub is_fragment: bool,
    /// True when the atom is one side of a declared cross-state link.
    pub is_linker: bool,
}

impl Atom {
    /// Creates an atom with zeroed parameters and no annotations.
    pub fn new(id: usize, parent_id: usize, atom_type: &str, pdb_name: &str) -> Self {
        Self {
            id,
            parent_id,
            location: AtomLocation::default(),
            atom_type: atom_type.to_string(),
            pdb_name: pdb_name.to_string(),
            extra: 0,
            zmatrix: [0.0; 3],
            nonbonded: NonbondedParams::default(),
            is_fragment: false,
            is_linker: false,
        }
    }

    /// The PDB name without column padding; atom identity uses this form.
    pub fn name(&self) -> &str {
        self.pdb_name.trim()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_has_zeroed_parameters_and_no_flags() {
        let atom = Atom::new(3, 1, "CT", "_C1_");
        assert_eq!(atom.id, 3);
        assert_eq!(atom.parent_id, 1);
        assert_eq!(atom.atom_type, "CT");
        assert_eq!(atom.pdb_name, "_C1_");
        assert_eq!(atom.nonbonded, NonbondedParams::default());
        assert!(!atom.is_fragment);
        assert!(!atom.is_linker);
        assert!(!atom.is_root());
    }

    #[test]
    fn atom_with_parent_zero_is_root() {
        let atom = Atom::new(1, 0, "CT", "_C1_");
        assert!(atom.is_root());
    }

    #[test]
    fn location_parses_main_and_side_flags() {
        assert_eq!("M".parse::<AtomLocation>(), Ok(AtomLocation::Main));
        assert_eq!("s".parse::<AtomLocation>(), Ok(AtomLocation::Side));
        assert_eq!("X".parse::<AtomLocation>(), Err(()));
        assert_eq!(AtomLocation::Side.to_string(), "S");
    }
}
