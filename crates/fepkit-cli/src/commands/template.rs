use crate::cli::TemplateArgs;
use crate::error::{CliError, Result};
use fepkit::core::io::opls::OplsFile;
use fepkit::core::io::traits::TemplateFile;
use fepkit::core::models::template::Template;
use fepkit::engine::error::EngineError;
use fepkit::engine::fragment::{FragmentDetector, PairKind};
use itertools::Itertools;
use std::path::Path;
use tracing::info;

pub fn run(args: TemplateArgs) -> Result<()> {
    let template = read_template(&args.input)?;
    print_summary(&template);

    if let Some(output) = &args.output {
        info!("Rewriting template to {:?}", output);
        OplsFile::write_to_path(&template, output).map_err(|e| CliError::FileParsing {
            path: output.clone(),
            source: e.into(),
        })?;
        println!("✓ Template written to: {}", output.display());
    }

    if let Some(other_path) = &args.against {
        let other = read_template(other_path)?;
        let topology = FragmentDetector::new()
            .with_links(args.links.clone())
            .detect(&template, &other)
            .map_err(EngineError::from)?;

        let explicit = topology.explicit();
        let direction = if topology.explicit_is_final() {
            "grows"
        } else {
            "vanishes"
        };
        println!(
            "Fragment {} along lambda; explicit state is '{}'.",
            direction,
            explicit.name()
        );

        let core = topology
            .atom_pairs()
            .filter(|pair| pair.kind == PairKind::Core)
            .filter_map(|pair| explicit.atom(pair.explicit))
            .map(|atom| atom.name())
            .join(" ");
        let linkers = topology
            .atom_pairs()
            .filter(|pair| pair.kind == PairKind::Linker)
            .filter_map(|pair| explicit.atom(pair.explicit))
            .map(|atom| atom.name())
            .join(" ");
        let fragment = explicit
            .fragment_atoms()
            .map(|atom| atom.name())
            .join(" ");

        println!("  Core atoms:     {}", core);
        println!("  Linker atoms:   {}", linkers);
        println!("  Fragment atoms: {}", fragment);
    }

    Ok(())
}

fn read_template(path: &Path) -> Result<Template> {
    info!("Loading template from {:?}", path);
    OplsFile::read_from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn print_summary(template: &Template) {
    println!("Template '{}'", template.name());
    println!("  Atoms:     {}", template.atom_count());
    println!("  Bonds:     {}", template.bonds().len());
    println!("  Angles:    {}", template.angles().len());
    println!(
        "  Dihedrals: {} proper, {} improper",
        template.proper_dihedrals().len(),
        template.improper_dihedrals().len()
    );
    let charge: f64 = template.atoms().iter().map(|a| a.nonbonded.charge).sum();
    println!("  Net charge: {:.4}", charge);
}
