//! LTR retrotransposon prediction cases: per-dataset regression runs,
//! option validation on a random sequence, and generated option mixes.

use super::{CaseRegistry, LTRHARVEST_KEYWORD, path_arg};
use crate::case::{
    ByteSource, CaseDefinitionError, ComparisonAssertion, PipelineStep, PipelineTestCase,
    split_arguments,
};
use crate::combinations::{OptionFragment, rendered_combinations};
use crate::compare::ComparisonMode;
use crate::config::SuiteConfig;
use crate::datasets::{DatasetTable, LtrharvestCollection, LtrharvestDataset, OutputMode, OutputVariant};
use crate::domain::{StepRole, SuiteResult};
use std::path::Path;

const RANDOM_SEQUENCE: &str = "Random.fna";
const INDEX_OPTIONS: [&str; 6] = ["-dna", "-suf", "-lcp", "-tis", "-des", "-ssp"];

/// Options mixed by the combination generator; each subset becomes a case.
pub(crate) const MIXED_OPTIONS: [&str; 6] = [
    "-seed 100",
    "-minlenltr 100",
    "-mindistltr 1500",
    "-similar 80",
    "-mintsd 5",
    "-range 1000 20000",
];

/// (case name suffix, options after `-index Random.fna`, expected exit code)
const OPTION_CASES: [(&str, &str, i32); 16] = [
    ("only index", "", 0),
    ("motif and motifmis", "-motif tgca -motifmis 0", 0),
    ("unvalid motif characters", "-motif qgca -motifmis 0", 1),
    ("motif not palindromic", "-motif agga -motifmis 0", 1),
    ("maxtsd requires mintsd", "-maxtsd 20", 1),
    ("mintsd and maxtsd", "-mintsd 4 -maxtsd 20", 0),
    ("motifmis requires motif", "-motifmis 0", 1),
    ("longoutput missing args", "-longoutput", 1),
    ("longoutput motif random", "-longoutput -motif tgca", 0),
    ("longoutput mintsd random", "-longoutput -mintsd 5", 0),
    ("overlaps1", "-overlaps no", 0),
    ("overlaps2", "-overlaps best", 0),
    ("overlaps3", "-overlaps all", 0),
    ("FASTA output", "-out out.fna", 0),
    ("FASTA inner output", "-outinner outinner.fna", 0),
    ("GFF3 output", "-gff3 out.gff3", 0),
];

pub(super) fn register(
    config: &SuiteConfig,
    table: &DatasetTable,
    registry: &mut CaseRegistry,
) -> SuiteResult<()> {
    for collection in &table.ltrharvest {
        let Some(root) = config.data_root(collection.root) else {
            tracing::debug!(
                collection = %collection.id,
                "skipping ltrharvest collection without configured data root"
            );
            continue;
        };
        let data_dir = root.join(&collection.directory);
        for dataset in collection.sorted_datasets() {
            for variant in &collection.variants {
                registry.add(dataset_case(config, collection, dataset, variant, &data_dir))?;
            }
        }
    }

    registry.add(missing_index_case(config))?;
    for (name, options, expected_exit) in OPTION_CASES {
        registry.add(random_sequence_case(
            config,
            &format!("gt ltrharvest {}", name),
            &split_arguments(options),
            expected_exit,
        ))?;
    }

    let fragments = MIXED_OPTIONS.map(OptionFragment::from);
    for (index, options) in rendered_combinations(&fragments).iter().enumerate() {
        registry.add(random_sequence_case(
            config,
            &format!("gt ltrharvest mixed options {}", index + 1),
            &split_arguments(options),
            0,
        ))?;
    }
    Ok(())
}

fn index_step(config: &SuiteConfig, sequence: &Path) -> PipelineStep {
    let index_name = sequence
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut args = vec![
        "suffixerator".to_string(),
        "-db".to_string(),
        path_arg(sequence),
    ];
    args.extend(INDEX_OPTIONS.iter().map(|option| option.to_string()));
    PipelineStep::new("index", StepRole::Setup, config.gt_binary(), args).producing(index_name)
}

/// Index the dataset, predict with the collection thresholds, compare the
/// transcript and annotation with the references, and check the annotation
/// with the GFF3 validator. A dataset declaring no hits expects the checker
/// to fail, the annotation comparison to report trouble and no annotation
/// file to be written at all.
fn dataset_case(
    config: &SuiteConfig,
    collection: &LtrharvestCollection,
    dataset: &LtrharvestDataset,
    variant: &OutputVariant,
    data_dir: &Path,
) -> Result<PipelineTestCase, CaseDefinitionError> {
    let key = dataset.key.as_str();
    let gff3 = format!("{}.gff3", key);
    let (name, transcript) = match variant.mode {
        OutputMode::Normal => (collection.case_name_for(dataset), format!("{}.out", key)),
        OutputMode::Long => (
            format!("{} longoutput", collection.case_name_for(dataset)),
            format!("{}_longoutput.out", key),
        ),
    };

    let mut args = vec!["ltrharvest".to_string()];
    if variant.mode == OutputMode::Long {
        args.push("-longoutput".to_string());
    }
    args.extend([
        "-index".to_string(),
        dataset.source.clone(),
        "-seed".to_string(),
        collection.seed_length_for(dataset).to_string(),
    ]);
    args.extend(split_arguments(&collection.parameters));
    args.extend(["-gff3".to_string(), gff3.clone()]);

    let fasta_outputs = [format!("{}.fas", key), format!("{}_inner.fas", key)];
    if collection.fasta_outputs {
        args.extend([
            "-out".to_string(),
            fasta_outputs[0].clone(),
            "-outinner".to_string(),
            fasta_outputs[1].clone(),
        ]);
    }

    let mut subject = PipelineStep::new("ltrharvest", StepRole::Subject, config.gt_binary(), args)
        .with_time_budget(variant.time_budget)
        .consuming(dataset.source.clone())
        .producing(gff3.clone());
    if collection.fasta_outputs {
        for output in &fasta_outputs {
            subject = subject.producing(output.clone());
        }
    }

    let mut checker = PipelineStep::new(
        "gff3-check",
        StepRole::Validate,
        config.gt_binary(),
        ["gff3".to_string(), gff3.clone()],
    )
    .consuming(gff3.clone());
    let mut annotation = ComparisonAssertion::new(
        ByteSource::file(&gff3),
        ByteSource::file(data_dir.join(&gff3)),
        ComparisonMode::Exact,
    );
    if let Some(policy) = dataset.no_hits {
        checker = checker.expect_exit(policy.checker_exit_code);
        if let Some(status) = policy.comparison_status() {
            annotation = annotation.expect_status(status);
        }
    }

    let mut builder = PipelineTestCase::builder(name)
        .tag(LTRHARVEST_KEYWORD)
        .step(
            index_step(config, &data_dir.join(&dataset.source))
                .with_time_budget(collection.index_time_budget),
        )
        .step(subject)
        .step(checker)
        .compare(ComparisonAssertion::new(
            ByteSource::stdout("ltrharvest"),
            ByteSource::file(data_dir.join(transcript)),
            ComparisonMode::Exact,
        ))
        .compare(annotation);

    if collection.fasta_outputs {
        for output in fasta_outputs {
            builder = builder.compare(ComparisonAssertion::new(
                ByteSource::file(&output),
                ByteSource::file(data_dir.join(&output)),
                ComparisonMode::Exact,
            ));
        }
    }
    if dataset.no_hits.is_some() {
        builder = builder.artifact_absent(&gff3);
    }
    builder.build()
}

fn missing_index_case(config: &SuiteConfig) -> Result<PipelineTestCase, CaseDefinitionError> {
    PipelineTestCase::builder("gt ltrharvest missing index")
        .tag(LTRHARVEST_KEYWORD)
        .step(
            PipelineStep::new(
                "ltrharvest",
                StepRole::Subject,
                config.gt_binary(),
                ["ltrharvest", "-index"],
            )
            .expect_exit(1),
        )
        .build()
}

fn random_sequence_case(
    config: &SuiteConfig,
    name: &str,
    options: &[String],
    expected_exit: i32,
) -> Result<PipelineTestCase, CaseDefinitionError> {
    let mut args = vec![
        "ltrharvest".to_string(),
        "-index".to_string(),
        RANDOM_SEQUENCE.to_string(),
    ];
    args.extend(options.iter().cloned());

    PipelineTestCase::builder(name)
        .tag(LTRHARVEST_KEYWORD)
        .step(index_step(config, &config.testdata(RANDOM_SEQUENCE)))
        .step(
            PipelineStep::new("ltrharvest", StepRole::Subject, config.gt_binary(), args)
                .consuming(RANDOM_SEQUENCE)
                .expect_exit(expected_exit),
        )
        .build()
}
