//! Maximal repeat and seed-extension cases.

use super::{CaseRegistry, EXTEND_KEYWORD, REPFIND_KEYWORD, path_arg};
use crate::case::{
    ByteSource, CaseBuilder, CaseDefinitionError, ComparisonAssertion, PipelineStep,
    PipelineTestCase, SourceSpec, split_arguments,
};
use crate::compare::{ComparisonMode, Normalization};
use crate::config::SuiteConfig;
use crate::datasets::{DataRoot, DatasetTable, RepfindDataset};
use crate::domain::{StepRole, SuiteResult};
use std::path::{Path, PathBuf};

const RESULT_DIR: &str = "repfind-result";
const INDEX_BUDGET: u64 = 320;
const SEARCH_BUDGET: u64 = 600;
const PAIR_MIN_LENGTH: u32 = 15;
const MIRRORED_ROUNDS: usize = 10;
const EXTENSIONS: [&str; 2] = ["xdrop", "greedy"];
const BUILD_OPTIONS: &str = "-algbds 3 31 80 -dna -suf -tis -lcp -ssp -pl";

/// Matches are `len seq pos strand len seq pos ...`; reading the query
/// fields first turns a B-versus-A run into the A-versus-B layout.
const FORWARD_COLUMNS: [usize; 8] = [1, 3, 4, 5, 7, 8, 9, 10];
const EXCHANGED_COLUMNS: [usize; 8] = [5, 7, 4, 1, 3, 8, 9, 10];
/// Everything but the query sequence number, which differs between a
/// combined index and a separate query file.
const SELF_QUERY_COLUMNS: [usize; 9] = [1, 2, 3, 4, 5, 7, 8, 9, 10];
const MATCH_LINE_PATTERN: &str = r"^\d+ \d+ \d+ . \d+ \d+ \d+ \d+ \d+\.\d+$";

pub(super) fn register(
    config: &SuiteConfig,
    table: &DatasetTable,
    registry: &mut CaseRegistry,
) -> SuiteResult<()> {
    registry.add(mirrored_symmetry_case(config))?;
    registry.add(small_case(config))?;
    registry.add(extend_reference_case(config))?;
    registry.add(extend_self_versus_query_case(config))?;

    if config.gttestdata_dir.is_none() {
        tracing::debug!("skipping repfind dataset cases without gttestdata");
        return Ok(());
    }
    let resolved = table
        .repfind
        .iter()
        .filter_map(|dataset| ResolvedDataset::new(config, dataset))
        .collect::<Vec<_>>();
    for reference in &resolved {
        registry.add(dataset_case(config, reference))?;
        for query in resolved
            .iter()
            .filter(|query| query.dataset.file != reference.dataset.file)
        {
            registry.add(pair_case(config, reference, query))?;
        }
    }
    Ok(())
}

struct ResolvedDataset<'a> {
    dataset: &'a RepfindDataset,
    sequence: PathBuf,
    results: PathBuf,
}

impl<'a> ResolvedDataset<'a> {
    fn new(config: &SuiteConfig, dataset: &'a RepfindDataset) -> Option<Self> {
        let sequence = config.data_root(dataset.root)?.join(dataset.relative_path());
        let results = config.data_root(dataset.result_root)?.join(RESULT_DIR);
        Some(Self {
            dataset,
            sequence,
            results,
        })
    }
}

fn gt_step<I, S>(config: &SuiteConfig, label: &str, role: StepRole, args: I) -> PipelineStep
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    PipelineStep::new(label, role, config.gt_binary(), args)
}

/// `gt suffixerator` over one or more sequence files.
fn index_step(
    config: &SuiteConfig,
    label: &str,
    sequences: &[String],
    index_name: &str,
    options: &str,
) -> PipelineStep {
    let mut args = vec!["suffixerator".to_string()];
    args.extend(split_arguments(options));
    args.push("-db".to_string());
    args.extend(sequences.iter().cloned());
    args.extend(["-indexname".to_string(), index_name.to_string()]);
    gt_step(config, label, StepRole::Setup, args).producing(index_name)
}

fn repfind_step(config: &SuiteConfig, label: &str, options: &str, index_name: &str) -> PipelineStep {
    let mut args = vec!["repfind".to_string()];
    args.extend(split_arguments(options));
    args.extend(["-ii".to_string(), index_name.to_string()]);
    gt_step(config, label, StepRole::Subject, args).consuming(index_name)
}

fn with_query(mut step: PipelineStep, query: &Path) -> PipelineStep {
    step.args.extend(["-q".to_string(), path_arg(query)]);
    step
}

fn exact(actual: impl Into<SourceSpec>, expected: impl Into<SourceSpec>) -> ComparisonAssertion {
    ComparisonAssertion::new(actual, expected, ComparisonMode::Exact)
}

/// Forward and reverse matches, plus greedy extension when the dataset
/// carries a reference for it.
fn dataset_case(
    config: &SuiteConfig,
    reference: &ResolvedDataset<'_>,
) -> Result<PipelineTestCase, CaseDefinitionError> {
    let dataset = reference.dataset;
    let min_length = format!("-l {}", dataset.min_length);
    let index = index_step(
        config,
        "index",
        &[path_arg(&reference.sequence)],
        "sfxidx",
        BUILD_OPTIONS,
    )
    .with_time_budget(INDEX_BUDGET);

    let mut builder = PipelineTestCase::builder(format!("gt repfind {}", dataset.file))
        .tag(REPFIND_KEYWORD)
        .step(index)
        .step(repfind_step(config, "forward", &min_length, "sfxidx").with_time_budget(SEARCH_BUDGET))
        .step(
            repfind_step(config, "reverse", &format!("{} -r", min_length), "sfxidx")
                .with_time_budget(SEARCH_BUDGET),
        )
        .compare(exact(
            ByteSource::stdout("forward"),
            ByteSource::file(reference.results.join(format!("{}.result", dataset.file))),
        ))
        .compare(exact(
            ByteSource::stdout("reverse"),
            ByteSource::file(reference.results.join(format!("{}-r.result", dataset.file))),
        ));

    if let Some(greedy_result) = &dataset.greedy_result {
        builder = builder
            .step(
                repfind_step(
                    config,
                    "greedy",
                    &format!(
                        "{} -extendgreedy -minidentity 90 -maxalilendiff 30 -percmathistory 55",
                        min_length
                    ),
                    "sfxidx",
                )
                .with_time_budget(SEARCH_BUDGET),
            )
            .compare(exact(
                ByteSource::stdout("greedy"),
                ByteSource::file(reference.results.join(greedy_result)),
            ));
    }
    builder.build()
}

fn pair_case(
    config: &SuiteConfig,
    reference: &ResolvedDataset<'_>,
    query: &ResolvedDataset<'_>,
) -> Result<PipelineTestCase, CaseDefinitionError> {
    let index_name = format!("{}-idx", reference.dataset.file);
    let expected = config
        .data_root(DataRoot::Gttestdata)
        .unwrap_or_else(|| Path::new(""))
        .join(RESULT_DIR)
        .join(format!("{}-{}.result", reference.dataset.file, query.dataset.file));

    PipelineTestCase::builder(format!(
        "gt repfind {} versus {}",
        reference.dataset.file, query.dataset.file
    ))
    .tag(REPFIND_KEYWORD)
    .step(index_step(
        config,
        "index",
        &[path_arg(&reference.sequence)],
        &index_name,
        BUILD_OPTIONS,
    ))
    .step(
        with_query(
            repfind_step(config, "query", &format!("-l {}", PAIR_MIN_LENGTH), &index_name),
            &query.sequence,
        )
        .with_time_budget(SEARCH_BUDGET),
    )
    .compare(exact(ByteSource::stdout("query"), ByteSource::file(expected)))
    .build()
}

/// Random mirrored sequences must produce symmetric greedy extensions; the
/// tool checks the property itself and signals it through its exit code.
fn mirrored_symmetry_case(config: &SuiteConfig) -> Result<PipelineTestCase, CaseDefinitionError> {
    let mut builder = PipelineTestCase::builder("gt repfind mirror symmetric").tag(REPFIND_KEYWORD);
    for round in 1..=MIRRORED_ROUNDS {
        let sequence_label = format!("randseq-{}", round);
        let sequence_file = format!("{}.stdout", sequence_label);
        builder = builder
            .step(
                PipelineStep::new(
                    sequence_label.as_str(),
                    StepRole::Setup,
                    config.script("gen-randseq.rb"),
                    split_arguments("--seedlength 200 --length 2200 --mode mirrored"),
                )
                .producing(sequence_file.as_str()),
            )
            .step(
                index_step(
                    config,
                    &format!("index-{}", round),
                    &[sequence_file.clone()],
                    "sfx",
                    "-suftabuint -dna -suf -tis -lcp -md5 no -des no -sds no",
                )
                .consuming(sequence_file),
            )
            .step(repfind_step(
                config,
                &format!("symmetry-{}", round),
                "-minidentity 90 -percmathistory 55 -scan -check_extend_symmetry -seedlength 200 -extendgreedy -maxalilendiff 30",
                "sfx",
            ));
    }
    builder.build()
}

fn small_case(config: &SuiteConfig) -> Result<PipelineTestCase, CaseDefinitionError> {
    let expected = config.testdata(Path::new(RESULT_DIR).join("Atinsert-8-8"));
    let without_comments = |step: &str| {
        SourceSpec::new(ByteSource::stdout(step), Normalization::without_comments())
    };

    PipelineTestCase::builder("gt repfind small")
        .tag(REPFIND_KEYWORD)
        .step(index_step(
            config,
            "index",
            &[path_arg(&config.testdata("Atinsert.fna"))],
            "sfx",
            "-dna -tis -suf -lcp -ssp -pl",
        ))
        .step(repfind_step(config, "maxpairs", "-l 8", "sfx"))
        .step(repfind_step(config, "scan", "-scan -l 8", "sfx"))
        .step(repfind_step(config, "samples-10", "-samples 10 -l 6", "sfx").with_time_budget(SEARCH_BUDGET))
        .step(repfind_step(config, "samples-1000", "-samples 1000 -l 6", "sfx").with_time_budget(SEARCH_BUDGET))
        .compare(ComparisonAssertion::new(
            without_comments("maxpairs"),
            ByteSource::file(&expected),
            ComparisonMode::IgnoreWhitespace,
        ))
        .compare(ComparisonAssertion::new(
            without_comments("scan"),
            ByteSource::file(&expected),
            ComparisonMode::IgnoreWhitespace,
        ))
        .build()
}

/// Extension against stored references, database/query exchange symmetry,
/// and agreement between sequence access methods.
fn extend_reference_case(config: &SuiteConfig) -> Result<PipelineTestCase, CaseDefinitionError> {
    let results = config.testdata(RESULT_DIR);
    let arabidopsis = config.testdata("at1MB");
    let insert = config.testdata("Atinsert.fna");
    let virus = config.testdata("U89959_genomic.fas");

    // (label, options, query, reference result)
    let referenced: [(&str, &str, Option<&Path>, &str); 7] = [
        ("xdrop", "-minidentity 90 -l 20 -extendxdrop -xdropbelow 5", None, "at1MB-xdrop-20-20-80-6"),
        ("U8-xdrop", "-minidentity 80 -l 20 -extendxdrop", Some(virus.as_path()), "at1MB-U8-xdrop-20-20-80-6"),
        (
            "Atinsert-greedy",
            "-minidentity 70 -l 700 -seedlength 15 -extendgreedy",
            Some(insert.as_path()),
            "at1MB-Atinsert-greedy-15-700-70-4-43",
        ),
        ("xdrop-a", "-extendxdrop -seedlength 70 -l 500 -minidentity 90 -a", None, "at1MB-xdrop-70-500-90-1-39-a"),
        (
            "Atinsert-greedy-a",
            "-minidentity 75 -l 700 -seedlength 20 -extendgreedy -a",
            Some(insert.as_path()),
            "at1MB-Atinsert-greedy-20-700-75-3-39-a",
        ),
        ("greedy-a", "-extendgreedy -seedlength 70 -l 500 -minidentity 90 -a", None, "at1MB-greedy-70-500-90-1-39-a"),
        ("U8-xdrop-a", "-minidentity 80 -l 20 -extendxdrop -a", Some(virus.as_path()), "at1MB-U8-xdrop-20-20-80-6-a"),
    ];

    let mut builder = PipelineTestCase::builder("gt repfind extend at1MB")
        .tags([REPFIND_KEYWORD, EXTEND_KEYWORD])
        .step(index_step(config, "index-at1MB", &[path_arg(&arabidopsis)], "at1MB", "-dna -tis -suf -lcp"));

    for (label, options, query, result) in referenced {
        let step = repfind_step(config, label, options, "at1MB");
        let step = match query {
            Some(query) => with_query(step, query),
            None => step,
        };
        builder = builder
            .step(step)
            .compare(exact(ByteSource::stdout(label), ByteSource::file(results.join(result))));
    }

    builder = builder.step(index_step(config, "index-U8", &[path_arg(&virus)], "U8", "-dna -tis -suf -lcp"));
    for extension in EXTENSIONS {
        let options = format!("-minidentity 80 -l 23 -extend{}", extension);
        let forward = format!("at1MB-vs-U8.{}", extension);
        let backward = format!("U8-vs-at1MB.{}", extension);
        builder = builder
            .step(with_query(repfind_step(config, &forward, &options, "at1MB"), &virus))
            .step(with_query(repfind_step(config, &backward, &options, "U8"), &arabidopsis));
        builder = exchange_symmetry(builder, &forward, &backward);
    }

    for seed_length in [12, 13, 14] {
        let options = format!("-seedlength {} -extendgreedy", seed_length);
        let baseline = format!("U8-selfcompare-{}", seed_length);
        builder = builder.step(repfind_step(config, &baseline, &options, "U8"));
        for access in ["encseq", "encseq_reader"] {
            let label = format!("{}-{}", baseline, access);
            builder = builder
                .step(repfind_step(config, &label, &format!("{} -cam {}", options, access), "U8"))
                .compare(exact(ByteSource::stdout(label.as_str()), ByteSource::stdout(baseline.as_str())));
        }
    }
    builder.build()
}

/// Both directions must report the same matches once the database and
/// query fields of the backward run are swapped.
fn exchange_symmetry(builder: CaseBuilder, forward: &str, backward: &str) -> CaseBuilder {
    let normalized = |step: &str, columns: &[usize]| {
        SourceSpec::new(
            ByteSource::stdout(step),
            Normalization {
                drop_comment_lines: true,
                columns: Some(columns.to_vec()),
                sort_lines: true,
            },
        )
    };
    builder.compare(exact(
        normalized(backward, &EXCHANGED_COLUMNS),
        normalized(forward, &FORWARD_COLUMNS),
    ))
}

fn extend_self_versus_query_case(
    config: &SuiteConfig,
) -> Result<PipelineTestCase, CaseDefinitionError> {
    let seed_length = 40;
    let min_identity = 80;
    let index_options = "-dna -suf -lcp -tis";
    let cut = |step: &str| {
        SourceSpec::new(
            ByteSource::stdout(step),
            Normalization::columns_sorted(SELF_QUERY_COLUMNS),
        )
    };

    let mut builder = PipelineTestCase::builder("gt repfind extend self vs query")
        .tags([REPFIND_KEYWORD, EXTEND_KEYWORD])
        .step(
            PipelineStep::new(
                "randseq",
                StepRole::Setup,
                config.script("gen-randseq.rb"),
                split_arguments(&format!(
                    "--minidentity {} --seedlength {} --length 200 --mode seeded --namedfiles",
                    min_identity, seed_length
                )),
            )
            .producing("db.fna")
            .producing("query.fna"),
        )
        .step(
            index_step(
                config,
                "index-db-query",
                &["db.fna".to_string(), "query.fna".to_string()],
                "db-query-index",
                index_options,
            )
            .consuming("db.fna")
            .consuming("query.fna"),
        )
        .step(
            index_step(config, "index-db", &["db.fna".to_string()], "db-index", index_options)
                .consuming("db.fna"),
        );

    for extension in EXTENSIONS {
        let options = format!(
            "-minidentity {} -extend{} -l {}",
            min_identity, extension, seed_length
        );
        let combined = format!("combined.{}", extension);
        let separate = format!("query.{}", extension);
        builder = builder
            .step(repfind_step(config, &combined, &options, "db-query-index"))
            .step(with_query(
                repfind_step(config, &separate, &options, "db-index"),
                Path::new("query.fna"),
            ))
            .compare(exact(cut(&separate), cut(&combined)))
            .lines_match(cut(&separate), MATCH_LINE_PATTERN);
    }
    builder.build()
}
