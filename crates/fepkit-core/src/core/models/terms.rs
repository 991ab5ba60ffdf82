/// A harmonic bond between two atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    /// Spring constant in kcal/(mol·Å²).
    pub spring: f64,
    /// Equilibrium distance in Angstroms.
    pub eq_dist: f64,
    pub is_fragment: bool,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, spring: f64, eq_dist: f64) -> Self {
        Self {
            atom1,
            atom2,
            spring,
            eq_dist,
            is_fragment: false,
        }
    }

    pub fn key(&self) -> (usize, usize) {
        (self.atom1, self.atom2)
    }

    pub fn contains(&self, atom_id: usize) -> bool {
        self.atom1 == atom_id || self.atom2 == atom_id
    }

    /// Returns the atom on the other end of the bond, if `atom_id` is part of it.
    pub fn partner_of(&self, atom_id: usize) -> Option<usize> {
        if self.atom1 == atom_id {
            Some(self.atom2)
        } else if self.atom2 == atom_id {
            Some(self.atom1)
        } else {
            None
        }
    }
}

/// A harmonic angle over an ordered atom triple (`atom2` is the vertex).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Angle {
    pub atom1: usize,
    pub atom2: usize,
    pub atom3: usize,
    /// Spring constant in kcal/(mol·rad²).
    pub spring: f64,
    /// Equilibrium angle in degrees.
    pub eq_angle: f64,
    pub is_fragment: bool,
}

impl Angle {
    pub fn new(atom1: usize, atom2: usize, atom3: usize, spring: f64, eq_angle: f64) -> Self {
        Self {
            atom1,
            atom2,
            atom3,
            spring,
            eq_angle,
            is_fragment: false,
        }
    }

    pub fn key(&self) -> (usize, usize, usize) {
        (self.atom1, self.atom2, self.atom3)
    }

    pub fn atoms(&self) -> [usize; 3] {
        [self.atom1, self.atom2, self.atom3]
    }

    pub fn contains(&self, atom_id: usize) -> bool {
        self.atoms().contains(&atom_id)
    }

    /// True when both atoms of the bond appear consecutively in the triple.
    pub fn spans_bond(&self, bond: &Bond) -> bool {
        let (a, b) = bond.key();
        let adjacent = |x: usize, y: usize| (x == a && y == b) || (x == b && y == a);
        adjacent(self.atom1, self.atom2) || adjacent(self.atom2, self.atom3)
    }

    /// The atom of the triple that is not part of `bond`, if the angle spans it.
    pub fn third_atom(&self, bond: &Bond) -> Option<usize> {
        if !self.spans_bond(bond) {
            return None;
        }
        self.atoms().into_iter().find(|id| !bond.contains(*id))
    }
}

/// A torsional term over four atoms.
///
/// Atom references are signed: the engine uses negative third/fourth ids as
/// exclusion markers, so the raw values are preserved and
/// [`Dihedral::atom_ids`] yields the absolute references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dihedral {
    pub atoms: [i64; 4],
    pub constant: f64,
    pub prefactor: f64,
    pub periodicity: f64,
    pub improper: bool,
    pub is_fragment: bool,
}

impl Dihedral {
    pub fn new(
        atoms: [i64; 4],
        constant: f64,
        prefactor: f64,
        periodicity: f64,
        improper: bool,
    ) -> Self {
        Self {
            atoms,
            constant,
            prefactor,
            periodicity,
            improper,
            is_fragment: false,
        }
    }

    pub fn atom_ids(&self) -> [usize; 4] {
        self.atoms.map(|id| id.unsigned_abs() as usize)
    }

    pub fn contains(&self, atom_id: usize) -> bool {
        self.atom_ids().contains(&atom_id)
    }
}
