use crate::core::io::opls::OplsFile;
use crate::core::io::traits::TemplateFile;
use crate::core::lambda::{Channel, Lambda, LambdaSchedule, Window};
use crate::core::models::template::Template;
use crate::engine::combiner::ParameterCombiner;
use crate::engine::config::{AlchemyConfig, StagePlan};
use crate::engine::error::EngineError;
use crate::engine::fragment::{AlchemicalTopology, FragmentDetector};
use crate::engine::progress::{Progress, ProgressReporter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One λ stage of a run: a schedule plus the λ the other channel is held at.
#[derive(Debug, Clone)]
pub struct Stage<'a> {
    /// 1-based position for split runs, `None` for a single dual stage.
    pub index: Option<usize>,
    pub schedule: &'a LambdaSchedule,
    pub constant: Option<Lambda>,
}

impl Stage<'_> {
    pub fn channel(&self) -> Channel {
        self.schedule.channel()
    }

    /// Folder of this stage relative to the output directory.
    pub fn directory_name(&self) -> Option<String> {
        self.index
            .map(|index| format!("{}_{}", index, self.channel().as_str()))
    }
}

/// Orders the stages of `plan`.
///
/// When atoms appear (`explicit_is_final`), sterics are grown with charges
/// off and charges switched on afterwards. When atoms vanish, charges are
/// removed first and sterics afterwards.
pub fn plan_stages(plan: &StagePlan, explicit_is_final: bool) -> Vec<Stage<'_>> {
    match plan {
        StagePlan::Dual(schedule) => vec![Stage {
            index: None,
            schedule,
            constant: None,
        }],
        StagePlan::Split { steric, coulombic } => {
            let (first, second) = if explicit_is_final {
                (steric, coulombic)
            } else {
                (coulombic, steric)
            };
            let held = |schedule: &LambdaSchedule, value| {
                schedule
                    .channel()
                    .complement()
                    .map(|channel| Lambda::clamped(value, channel))
            };
            vec![
                Stage {
                    index: Some(1),
                    schedule: first,
                    constant: held(first, 0.0),
                },
                Stage {
                    index: Some(2),
                    schedule: second,
                    constant: held(second, 1.0),
                },
            ]
        }
    }
}

/// A template written for one λ.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTemplate {
    pub lambda: Lambda,
    /// The sampled λ this template is reweighted from, for shifted λ values.
    pub source: Option<Lambda>,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AlchemyResult {
    pub topology: AlchemicalTopology,
    pub templates: Vec<GeneratedTemplate>,
}

#[derive(Debug, Clone)]
struct TemplateJob {
    lambda: Lambda,
    constant: Option<Lambda>,
    source: Option<Lambda>,
    path: PathBuf,
}

pub fn load_template(path: &Path) -> Result<Template, EngineError> {
    OplsFile::read_from_path(path).map_err(|source| EngineError::TemplateFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes one alchemical template per scheduled λ and per shifted λ.
///
/// Templates for a scheduled λ go to `<stage>/<λ>/`, templates for a
/// shifted λ to the window folder `<stage>/<λ>_<shifted λ>/`.
#[instrument(skip_all, name = "alchemy_workflow")]
pub fn run(
    config: &AlchemyConfig,
    reporter: &ProgressReporter,
) -> Result<AlchemyResult, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Loading templates",
    });
    let initial = load_template(&config.initial_template)?;
    let final_state = load_template(&config.final_template)?;
    info!(
        "Loaded end states '{}' ({} atoms) and '{}' ({} atoms)",
        initial.name(),
        initial.atom_count(),
        final_state.name(),
        final_state.atom_count()
    );
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Fragment detection",
    });
    let topology = FragmentDetector::new()
        .with_links(config.links.clone())
        .pair_angles(config.bonded.angles)
        .detect(&initial, &final_state)?;
    reporter.report(Progress::PhaseFinish);

    let templates = write_templates(&topology, config, reporter)?;
    info!("Wrote {} alchemical templates", templates.len());

    Ok(AlchemyResult {
        topology,
        templates,
    })
}

/// Writes the templates of every stage for an already detected topology.
pub fn write_templates(
    topology: &AlchemicalTopology,
    config: &AlchemyConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<GeneratedTemplate>, EngineError> {
    let combiner = ParameterCombiner::new(topology).with_bonded(config.bonded);
    let file_name = config
        .output_name
        .clone()
        .unwrap_or_else(|| topology.explicit().default_output_name());

    reporter.report(Progress::PhaseStart {
        name: "Writing templates",
    });
    let mut generated = Vec::new();
    for stage in plan_stages(&config.stages, topology.explicit_is_final()) {
        if let Some(index) = stage.index {
            reporter.report(Progress::StageStart {
                index,
                channel: stage.channel(),
            });
        }
        let stage_dir = match stage.directory_name() {
            Some(name) => config.output_dir.join(name),
            None => config.output_dir.clone(),
        };
        let jobs = stage_jobs(&stage, config, &stage_dir, &file_name)?;
        debug!(
            "{} stage: {} templates under '{}'",
            stage.channel(),
            jobs.len(),
            stage_dir.display()
        );

        reporter.report(Progress::TaskStart {
            total_steps: jobs.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = jobs.iter();

        #[cfg(feature = "parallel")]
        let iterator = jobs.par_iter();

        let results: Vec<Result<GeneratedTemplate, EngineError>> = iterator
            .map(|job| {
                let result = write_job(&combiner, job);
                reporter.report(Progress::TaskIncrement);
                result
            })
            .collect();
        reporter.report(Progress::TaskFinish);

        for result in results {
            generated.push(result?);
        }
    }
    reporter.report(Progress::PhaseFinish);

    Ok(generated)
}

fn stage_jobs(
    stage: &Stage,
    config: &AlchemyConfig,
    stage_dir: &Path,
    file_name: &str,
) -> Result<Vec<TemplateJob>, EngineError> {
    let mut jobs = Vec::new();
    for node in stage.schedule.nodes() {
        jobs.push(TemplateJob {
            lambda: node.lambda,
            constant: stage.constant,
            source: None,
            path: stage_dir.join(node.lambda.folder_name()).join(file_name),
        });
        for shifted in config.sampling.shifted_lambdas(stage.schedule, node)? {
            let window = Window::new(node.lambda, shifted);
            jobs.push(TemplateJob {
                lambda: shifted,
                constant: stage.constant,
                source: Some(node.lambda),
                path: stage_dir.join(window.folder_name()).join(file_name),
            });
        }
    }
    Ok(jobs)
}

fn write_job(combiner: &ParameterCombiner, job: &TemplateJob) -> Result<GeneratedTemplate, EngineError> {
    if let Some(dir) = job.path.parent() {
        fs::create_dir_all(dir).map_err(|source| EngineError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let template = combiner.combine_with_constant(&job.lambda, job.constant.as_ref());
    OplsFile::write_to_path(&template, &job.path).map_err(|source| EngineError::TemplateFile {
        path: job.path.clone(),
        source,
    })?;
    debug!("Wrote {} to '{}'", job.lambda, job.path.display());

    Ok(GeneratedTemplate {
        lambda: job.lambda,
        source: job.source,
        path: job.path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::combiner::BondedInterpolation;
    use crate::engine::config::AlchemyConfigBuilder;
    use crate::engine::fragment::tests::{ethyl_initial, propyl_final};
    use crate::engine::fragment::AtomLink;
    use crate::engine::sampling::SamplingMethod;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_end_states(dir: &Path) -> (PathBuf, PathBuf) {
        let initial = dir.join("ethz");
        let final_state = dir.join("propz");
        OplsFile::write_to_path(&ethyl_initial(), &initial).unwrap();
        OplsFile::write_to_path(&propyl_final(), &final_state).unwrap();
        (initial, final_state)
    }

    fn builder(dir: &Path) -> AlchemyConfigBuilder {
        let (initial, final_state) = write_end_states(dir);
        AlchemyConfigBuilder::new()
            .initial_template(initial)
            .final_template(final_state)
            .links(vec![AtomLink::new("_H3_", "_C4_")])
            .sampling(SamplingMethod::DoubleWide)
            .output_dir(dir.join("calc"))
            .output_name("ligz".to_string())
    }

    fn charge_of(path: &Path, name: &str) -> f64 {
        let template = OplsFile::read_from_path(path).unwrap();
        template.atom_by_name(name).unwrap().nonbonded.charge
    }

    #[test]
    fn dual_run_writes_node_and_window_templates() {
        let dir = tempfile::tempdir().unwrap();
        let config = builder(dir.path()).lambdas(vec![0.5]).build().unwrap();

        let result = run(&config, &ProgressReporter::new()).unwrap();

        let calc = dir.path().join("calc");
        let paths: Vec<_> = result.templates.iter().map(|t| t.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                calc.join("0.5").join("ligz"),
                calc.join("0.5_0.0").join("ligz"),
                calc.join("0.5_1.0").join("ligz"),
            ]
        );
        assert!(result.topology.explicit_is_final());

        assert!((charge_of(&paths[0], "_H5_") - 0.03).abs() < 1e-6);
        assert!(charge_of(&paths[1], "_H5_").abs() < 1e-6);
        assert!((charge_of(&paths[2], "_H5_") - 0.06).abs() < 1e-6);
    }

    #[test]
    fn split_run_grows_sterics_before_charges() {
        let dir = tempfile::tempdir().unwrap();
        let config = builder(dir.path())
            .lambdas(vec![0.5])
            .split_channels(true)
            .sampling(SamplingMethod::DoubleEnded)
            .build()
            .unwrap();

        let result = run(&config, &ProgressReporter::new()).unwrap();

        let calc = dir.path().join("calc");
        let steric = calc.join("1_Steric").join("0.5").join("ligz");
        let coulombic = calc.join("2_Coulombic").join("0.5").join("ligz");
        assert_eq!(result.templates.len(), 2);
        assert!(charge_of(&steric, "_H5_").abs() < 1e-6);
        assert!((charge_of(&coulombic, "_H5_") - 0.03).abs() < 1e-6);

        let template = OplsFile::read_from_path(&coulombic).unwrap();
        let h5 = template.atom_by_name("_H5_").unwrap();
        assert!((h5.nonbonded.sigma - 2.5).abs() < 1e-4);
    }

    #[test]
    fn split_run_carries_grown_bonds_into_the_charge_stage() {
        let dir = tempfile::tempdir().unwrap();
        let config = builder(dir.path())
            .lambdas(vec![0.05, 0.95])
            .split_channels(true)
            .sampling(SamplingMethod::DoubleEnded)
            .bonded(BondedInterpolation {
                bonds: true,
                angles: false,
            })
            .build()
            .unwrap();

        run(&config, &ProgressReporter::new()).unwrap();

        let calc = dir.path().join("calc");
        let bond_of = |path: PathBuf| {
            let template = OplsFile::read_from_path(path).unwrap();
            *template.bond((3, 4)).unwrap()
        };
        let grown = *propyl_final().bond((3, 4)).unwrap();
        let late_steric = bond_of(calc.join("1_Steric").join("0.95").join("ligz"));
        let early_coulombic = bond_of(calc.join("2_Coulombic").join("0.05").join("ligz"));

        assert!((early_coulombic.eq_dist - grown.eq_dist).abs() < 1e-3);
        assert!((early_coulombic.spring - grown.spring).abs() < 1e-2);
        assert!((late_steric.eq_dist - grown.eq_dist).abs() < 0.1 * grown.eq_dist);
    }

    #[test]
    fn deletion_removes_charges_first() {
        let stages = StagePlan::Split {
            steric: LambdaSchedule::new(&[0.5], Channel::Steric).unwrap(),
            coulombic: LambdaSchedule::new(&[0.5], Channel::Coulombic).unwrap(),
        };
        let planned = plan_stages(&stages, false);

        assert_eq!(planned[0].channel(), Channel::Coulombic);
        assert_eq!(
            planned[0].constant,
            Some(Lambda::new(0.0, Channel::Steric).unwrap())
        );
        assert_eq!(planned[1].directory_name().as_deref(), Some("2_Steric"));
        assert_eq!(
            planned[1].constant,
            Some(Lambda::new(1.0, Channel::Coulombic).unwrap())
        );
    }

    #[test]
    fn progress_counts_every_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = builder(dir.path())
            .lambdas(vec![0.25, 0.75])
            .bonded(BondedInterpolation {
                bonds: true,
                angles: true,
            })
            .build()
            .unwrap();
        let increments = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if event == Progress::TaskIncrement {
                increments.fetch_add(1, Ordering::Relaxed);
            }
        }));

        let result = run(&config, &reporter).unwrap();

        assert_eq!(result.templates.len(), 6);
        assert_eq!(increments.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn missing_template_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = AlchemyConfigBuilder::new()
            .initial_template(dir.path().join("nope"))
            .final_template(dir.path().join("nope2"))
            .lambdas(vec![0.5])
            .sampling(SamplingMethod::DoubleWide)
            .output_dir(dir.path().to_path_buf())
            .build()
            .unwrap();

        let err = run(&config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::TemplateFile { path, .. } if path.ends_with("nope")));
    }

    #[test]
    fn overlap_sampling_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = builder(dir.path())
            .lambdas(vec![0.5])
            .sampling(SamplingMethod::Overlap)
            .build()
            .unwrap();

        assert!(matches!(
            run(&config, &ProgressReporter::new()),
            Err(EngineError::Sampling(_))
        ));
    }
}
