use crate::core::io::traits::TemplateFile;
use crate::core::models::atom::{Atom, AtomLocation, NonbondedParams};
use crate::core::models::template::{
    HeaderCounts, Template, TemplateBuilder, TemplateError, TemplateHeader,
};
use crate::core::models::terms::{Angle, Bond, Dihedral};
use phf::{Map, phf_map};
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use thiserror::Error;

/// Sections of an OPLS2005 template, in the order they must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Resx,
    Nbon,
    Bond,
    Thet,
    Phi,
    Iphi,
    End,
}

impl Section {
    pub fn keyword(self) -> &'static str {
        match self {
            Section::Resx => "RESX",
            Section::Nbon => "NBON",
            Section::Bond => "BOND",
            Section::Thet => "THET",
            Section::Phi => "PHI",
            Section::Iphi => "IPHI",
            Section::End => "END",
        }
    }

    fn next(self) -> Section {
        match self {
            Section::Resx => Section::Nbon,
            Section::Nbon => Section::Bond,
            Section::Bond => Section::Thet,
            Section::Thet => Section::Phi,
            Section::Phi => Section::Iphi,
            Section::Iphi | Section::End => Section::End,
        }
    }
}

static SECTION_KEYWORDS: Map<&'static str, Section> = phf_map! {
    "NBON" => Section::Nbon,
    "BOND" => Section::Bond,
    "THET" => Section::Thet,
    "PHI" => Section::Phi,
    "IPHI" => Section::Iphi,
    "END" => Section::End,
};

#[derive(Debug, Error)]
pub enum OplsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: OplsParseErrorKind,
    },
    #[error("Template header is incomplete (expected two comment lines and a counts line)")]
    MissingHeader,
    #[error("Template ended before the {0} section")]
    MissingSection(&'static str),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OplsParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Invalid tree location flag '{value}' (expected M or S)")]
    InvalidLocation { value: String },
    #[error("Counts line must hold a name and five integers (found: '{value}')")]
    InvalidCounts { value: String },
    #[error("Section {found} cannot follow section {current}")]
    OutOfOrderSection {
        found: &'static str,
        current: &'static str,
    },
}

fn slice(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).unwrap_or("")
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    slice(line, start, end).trim()
}

fn columns(start: usize, end: usize) -> String {
    format!("{}-{}", start + 1, end)
}

fn required<'a>(
    line: &'a str,
    line_num: usize,
    start: usize,
    end: usize,
) -> Result<&'a str, OplsError> {
    let value = slice_and_trim(line, start, end);
    if value.is_empty() {
        return Err(OplsError::Parse {
            line: line_num,
            kind: OplsParseErrorKind::MissingRequiredField {
                columns: columns(start, end),
            },
        });
    }
    Ok(value)
}

fn parse_int<T: FromStr>(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
) -> Result<T, OplsError> {
    let value = required(line, line_num, start, end)?;
    value.parse().map_err(|_| OplsError::Parse {
        line: line_num,
        kind: OplsParseErrorKind::InvalidInt {
            columns: columns(start, end),
            value: value.into(),
        },
    })
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, OplsError> {
    let value = required(line, line_num, start, end)?;
    value.parse().map_err(|_| OplsError::Parse {
        line: line_num,
        kind: OplsParseErrorKind::InvalidFloat {
            columns: columns(start, end),
            value: value.into(),
        },
    })
}

fn parse_counts_line(line: &str, line_num: usize) -> Result<(String, HeaderCounts), OplsError> {
    let invalid = || OplsError::Parse {
        line: line_num,
        kind: OplsParseErrorKind::InvalidCounts {
            value: line.to_string(),
        },
    };

    let name = required(line, line_num, 0, 5)?.to_string();
    let counts = line
        .get(5..)
        .unwrap_or("")
        .split_whitespace()
        .map(|field| field.parse::<i64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    match counts.as_slice() {
        &[nonbonded, bonds, angles, dihedrals, non_null] => Ok((
            name,
            HeaderCounts {
                nonbonded,
                bonds,
                angles,
                dihedrals,
                non_null,
            },
        )),
        _ => Err(invalid()),
    }
}

fn parse_atom(line: &str, line_num: usize) -> Result<Atom, OplsError> {
    let id = parse_int(line, line_num, 0, 5)?;
    let parent_id = parse_int(line, line_num, 5, 11)?;
    let location_str = slice_and_trim(line, 11, 13);
    let location: AtomLocation = location_str.parse().map_err(|_| OplsError::Parse {
        line: line_num,
        kind: OplsParseErrorKind::InvalidLocation {
            value: location_str.into(),
        },
    })?;
    let atom_type = required(line, line_num, 16, 20)?;
    required(line, line_num, 21, 25)?;
    let pdb_name = slice(line, 21, 25);

    let mut atom = Atom::new(id, parent_id, atom_type, pdb_name);
    atom.location = location;
    atom.extra = parse_int(line, line_num, 25, 31)?;
    atom.zmatrix = [
        parse_float(line, line_num, 31, 43)?,
        parse_float(line, line_num, 43, 55)?,
        parse_float(line, line_num, 55, 67)?,
    ];
    Ok(atom)
}

fn parse_nonbonded(line: &str, line_num: usize) -> Result<(usize, NonbondedParams), OplsError> {
    let id = parse_int(line, line_num, 0, 6)?;
    let params = NonbondedParams {
        sigma: parse_float(line, line_num, 6, 15)?,
        epsilon: parse_float(line, line_num, 15, 24)?,
        charge: parse_float(line, line_num, 24, 35)?,
        sgb_radius: parse_float(line, line_num, 35, 44)?,
        radius_type: parse_float(line, line_num, 44, 53)?,
        sgb_gamma: parse_float(line, line_num, 53, 67)?,
        sgb_type: parse_float(line, line_num, 67, 81)?,
    };
    Ok((id, params))
}

fn parse_bond(line: &str, line_num: usize) -> Result<Bond, OplsError> {
    Ok(Bond::new(
        parse_int(line, line_num, 0, 6)?,
        parse_int(line, line_num, 6, 12)?,
        parse_float(line, line_num, 12, 22)?,
        parse_float(line, line_num, 22, 29)?,
    ))
}

fn parse_angle(line: &str, line_num: usize) -> Result<Angle, OplsError> {
    Ok(Angle::new(
        parse_int(line, line_num, 0, 6)?,
        parse_int(line, line_num, 6, 12)?,
        parse_int(line, line_num, 12, 18)?,
        parse_float(line, line_num, 18, 30)?,
        parse_float(line, line_num, 30, 41)?,
    ))
}

/// Proper and improper dihedral records differ only by a leading space.
fn parse_dihedral(line: &str, line_num: usize, improper: bool) -> Result<Dihedral, OplsError> {
    let o = usize::from(improper);
    Ok(Dihedral::new(
        [
            parse_int(line, line_num, 0, 5 + o)?,
            parse_int(line, line_num, 5 + o, 11 + o)?,
            parse_int(line, line_num, 11 + o, 17 + o)?,
            parse_int(line, line_num, 17 + o, 23 + o)?,
        ],
        parse_float(line, line_num, 23 + o, 33 + o)?,
        parse_float(line, line_num, 33 + o, 38 + o)?,
        parse_float(line, line_num, 38 + o, 42 + o)?,
        improper,
    ))
}

fn write_dihedral(writer: &mut impl Write, dihedral: &Dihedral) -> io::Result<()> {
    let lead = if dihedral.improper { " " } else { "" };
    let [a, b, c, d] = dihedral.atoms;
    writeln!(
        writer,
        "{}{:>5} {:>5} {:>5} {:>5} {:>9.5} {:>4.1} {:>3.1}",
        lead, a, b, c, d, dihedral.constant, dihedral.prefactor, dihedral.periodicity
    )
}

/// Reader and writer for the fixed-column OPLS2005 template format.
pub struct OplsFile;

impl TemplateFile for OplsFile {
    type Error = OplsError;

    fn read_from(reader: &mut impl BufRead) -> Result<Template, Self::Error> {
        let mut lines = reader.lines().enumerate();

        let mut comment_lines = Vec::with_capacity(2);
        let mut counts_line = None;
        for (idx, line_res) in lines.by_ref() {
            let line = line_res?;
            if comment_lines.len() < 2 {
                comment_lines.push(line);
            } else {
                counts_line = Some((idx + 1, line));
                break;
            }
        }
        let (counts_line_num, counts_line) = counts_line.ok_or(OplsError::MissingHeader)?;
        let (name, counts) = parse_counts_line(&counts_line, counts_line_num)?;

        let mut builder = TemplateBuilder::new(TemplateHeader {
            comment_lines,
            name,
            counts,
        });

        let mut section = Section::Resx;
        for (idx, line_res) in lines {
            let line = line_res?;
            let line_num = idx + 1;

            if line.trim().is_empty() {
                continue;
            }
            if let Some(&found) = SECTION_KEYWORDS.get(line.trim()) {
                if found <= section {
                    return Err(OplsError::Parse {
                        line: line_num,
                        kind: OplsParseErrorKind::OutOfOrderSection {
                            found: found.keyword(),
                            current: section.keyword(),
                        },
                    });
                }
                section = found;
                if section == Section::End {
                    break;
                }
                continue;
            }

            match section {
                Section::Resx => {
                    builder.add_atom(parse_atom(&line, line_num)?);
                }
                Section::Nbon => {
                    let (id, params) = parse_nonbonded(&line, line_num)?;
                    builder.set_nonbonded(id, params);
                }
                Section::Bond => {
                    builder.add_bond(parse_bond(&line, line_num)?);
                }
                Section::Thet => {
                    builder.add_angle(parse_angle(&line, line_num)?);
                }
                Section::Phi => {
                    builder.add_dihedral(parse_dihedral(&line, line_num, false)?);
                }
                Section::Iphi => {
                    builder.add_dihedral(parse_dihedral(&line, line_num, true)?);
                }
                Section::End => break,
            }
        }

        if section != Section::End {
            return Err(OplsError::MissingSection(section.next().keyword()));
        }

        Ok(builder.build()?)
    }

    fn write_to(template: &Template, writer: &mut impl Write) -> Result<(), Self::Error> {
        let header = template.header();
        for line in &header.comment_lines {
            writeln!(writer, "{}", line)?;
        }
        let counts = header.counts;
        writeln!(
            writer,
            "{:<5}{:>6}{:>6}{:>6}{:>8}{:>8}",
            header.name,
            counts.nonbonded,
            counts.bonds,
            counts.angles,
            counts.dihedrals,
            counts.non_null
        )?;

        for atom in template.atoms() {
            let [x, y, z] = atom.zmatrix;
            writeln!(
                writer,
                "{:>5} {:>5} {:1}   {:<4} {:<4} {:>5}{:>12.6}{:>12.6}{:>12.6}",
                atom.id,
                atom.parent_id,
                atom.location.as_char(),
                atom.atom_type,
                atom.pdb_name,
                atom.extra,
                x,
                y,
                z
            )?;
        }

        writeln!(writer, "{}", Section::Nbon.keyword())?;
        for atom in template.atoms() {
            let nb = &atom.nonbonded;
            writeln!(
                writer,
                " {:>5} {:>8.4} {:>8.4} {:>10.6} {:>8.4} {:>8.4} {:>13.9} {:>13.9}",
                atom.id,
                nb.sigma,
                nb.epsilon,
                nb.charge,
                nb.sgb_radius,
                nb.radius_type,
                nb.sgb_gamma,
                nb.sgb_type
            )?;
        }

        writeln!(writer, "{}", Section::Bond.keyword())?;
        for bond in template.bonds() {
            writeln!(
                writer,
                " {:>5} {:>5} {:>9.3} {:>6.3}",
                bond.atom1, bond.atom2, bond.spring, bond.eq_dist
            )?;
        }

        writeln!(writer, "{}", Section::Thet.keyword())?;
        for angle in template.angles() {
            writeln!(
                writer,
                " {:>5} {:>5} {:>5} {:>11.5}{:>11.5}",
                angle.atom1, angle.atom2, angle.atom3, angle.spring, angle.eq_angle
            )?;
        }

        writeln!(writer, "{}", Section::Phi.keyword())?;
        for dihedral in template.proper_dihedrals() {
            write_dihedral(writer, dihedral)?;
        }

        writeln!(writer, "{}", Section::Iphi.keyword())?;
        for dihedral in template.improper_dihedrals() {
            write_dihedral(writer, dihedral)?;
        }

        writeln!(writer, "{}", Section::End.keyword())?;
        Ok(())
    }
}
