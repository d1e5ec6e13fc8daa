mod cli;
mod model;

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use burn::module::Module;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use burn_autodiff::Autodiff;
use burn_candle::{Candle, CandleDevice};
use ndarray::Array2;
use nsdae_core::{
    encode_surface_png_data_url, ensure_report_file, load_hemisphere_fmri, load_or_init,
    load_train_test_datasets, project_class, surface, update_sections, BatchIterator,
    EvaluationMetrics, Hemisphere, ReportSection, RoiSurfaceMaps, SplitDatasets, StepMetrics,
    TrainConfig, DEFAULT_REPORT_TEMPLATE,
};
use serde::{Deserialize, Serialize};

use cli::{print_usage, CliArgs, RunMode};
use model::Autoencoder;

type TrainingBackend = Autodiff<Candle<f32, i64>>;

const MODEL_SEED: u64 = 1337;
const BATCH_SEED: u64 = 7;
/// Latent activations below this magnitude count as inactive.
const NEAR_ZERO: f32 = 1e-3;
const BENCHMARK_TOLERANCE: f32 = 5e-3;
const SURFACE_STRIP_WIDTH: u32 = 512;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct BenchmarkSnapshot {
    final_train: StepMetrics,
    final_test: EvaluationMetrics,
}

struct TrainingOutcome {
    history: Vec<StepMetrics>,
    final_train: StepMetrics,
    final_test: EvaluationMetrics,
}

fn main() -> Result<()> {
    let args = CliArgs::parse_from_env()?;
    if args.help_requested {
        print_usage();
        return Ok(());
    }

    let results_dir = args.config.results_dir();
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("failed to create results directory {}", results_dir.display()))?;

    let config_path = results_dir.join("config.json");
    let config: TrainConfig = load_or_init(&config_path, || args.config.clone())?;
    ensure_config_matches(&config_path, &config, &args.config)?;
    config.validate()?;

    let report_path = results_dir.join("report.md");
    ensure_report_file(&report_path, DEFAULT_REPORT_TEMPLATE)?;

    println!(
        "training {} autoencoder for subject {}, ROI class {}, hemisphere {} ({} mode)",
        config.ds,
        args.subject,
        config.roi_class,
        config.hem.label(),
        args.mode.label()
    );

    let datasets =
        load_train_test_datasets(&args.data_dir, args.subject, &config.roi_class, config.hem)?;
    println!(
        "datasets ready: {} train rows, {} test rows, {} voxels",
        datasets.train.nrows(),
        datasets.test.nrows(),
        datasets.train.ncols()
    );

    let outcome = run_training(&config, args.mode, &datasets, &results_dir)?;

    write_report(
        &report_path,
        &config,
        &args.data_dir,
        args.subject,
        args.mode,
        &outcome,
    )?;

    let benchmark_path = results_dir.join("benchmark.json");
    if args.mode == RunMode::Test {
        let snapshot = BenchmarkSnapshot {
            final_train: outcome.final_train.clone(),
            final_test: outcome.final_test,
        };
        match load_benchmark(&benchmark_path)? {
            Some(reference) => {
                validate_benchmark(&snapshot, &reference)?;
                println!("benchmark check passed (tolerance {:.1e})", BENCHMARK_TOLERANCE);
            }
            None => {
                save_benchmark(&benchmark_path, &snapshot)?;
                println!("saved new benchmark snapshot to {}", benchmark_path.display());
            }
        }
    }

    Ok(())
}

/// The results directory encodes only part of the configuration, so a stored
/// `config.json` can belong to a run with different flags. Any disagreement
/// with the command line is rejected outright rather than silently training
/// with the stored values.
fn ensure_config_matches(
    path: &Path,
    stored: &TrainConfig,
    requested: &TrainConfig,
) -> Result<()> {
    if stored == requested {
        return Ok(());
    }

    let mut conflicts = Vec::new();
    if stored.learning_rate != requested.learning_rate {
        conflicts.push(format!(
            "learning_rate (stored {}, requested {})",
            stored.learning_rate, requested.learning_rate
        ));
    }
    if stored.latent_dim != requested.latent_dim {
        conflicts.push(format!(
            "latent_dim (stored {}, requested {})",
            stored.latent_dim, requested.latent_dim
        ));
    }
    if stored.batch_size != requested.batch_size {
        conflicts.push(format!(
            "batch_size (stored {}, requested {})",
            stored.batch_size, requested.batch_size
        ));
    }
    if stored.num_epochs != requested.num_epochs {
        conflicts.push(format!(
            "num_epochs (stored {}, requested {})",
            stored.num_epochs, requested.num_epochs
        ));
    }
    if stored.roi_class != requested.roi_class {
        conflicts.push(format!(
            "roi_class (stored {}, requested {})",
            stored.roi_class, requested.roi_class
        ));
    }
    if stored.hem != requested.hem {
        conflicts.push(format!(
            "hem (stored {}, requested {})",
            stored.hem.label(),
            requested.hem.label()
        ));
    }
    if stored.ds != requested.ds {
        conflicts.push(format!(
            "ds (stored {}, requested {})",
            stored.ds, requested.ds
        ));
    }
    if stored.sparsity != requested.sparsity {
        conflicts.push(format!(
            "sparsity (stored {}, requested {})",
            stored.sparsity, requested.sparsity
        ));
    }
    if stored.l1 != requested.l1 {
        conflicts.push(format!(
            "l1 (stored {}, requested {})",
            stored.l1, requested.l1
        ));
    }

    Err(anyhow!(
        "stored config {} disagrees with the command line on {}; \
         remove the results directory to start a fresh run",
        path.display(),
        conflicts.join(", ")
    ))
}

fn run_training(
    config: &TrainConfig,
    mode: RunMode,
    datasets: &SplitDatasets,
    results_dir: &Path,
) -> Result<TrainingOutcome> {
    let device = CandleDevice::Cpu;
    let voxels = datasets.train.ncols();
    let mut model: Autoencoder<TrainingBackend> =
        Autoencoder::init(&device, voxels, config.latent_dim, MODEL_SEED);
    let mut optimizer = AdamConfig::new().init();

    let mut batches = BatchIterator::new(datasets.train.clone(), config.batch_size, BATCH_SEED)?;
    let steps_per_epoch = batches.batches_per_epoch();
    let num_epochs = mode.epochs(config.num_epochs);

    let test_tensor = tensor_from_rows::<TrainingBackend>(&datasets.test, &device);

    let mut history = Vec::with_capacity(num_epochs * steps_per_epoch);
    for epoch in 1..=num_epochs {
        for step in 1..=steps_per_epoch {
            let rows = batches
                .next()
                .ok_or_else(|| anyhow!("batch stream ended unexpectedly"))?;
            let batch = tensor_from_rows::<TrainingBackend>(&rows, &device);

            let (recon, latent) = model.forward(batch.clone());
            let recon_loss = MseLoss::new().forward(recon, batch, Reduction::Mean);
            let l1_penalty = latent.abs().mean().mul_scalar(config.l1);
            let loss = recon_loss.clone() + l1_penalty.clone();

            let metrics = StepMetrics {
                epoch,
                step,
                loss: loss.clone().into_scalar().elem::<f32>(),
                recon_loss: recon_loss.into_scalar().elem::<f32>(),
                l1_penalty: l1_penalty.into_scalar().elem::<f32>(),
            };
            println!(
                "epoch {:02} step {:03}: loss {:.5} (recon {:.5}, l1 {:.5})",
                epoch, step, metrics.loss, metrics.recon_loss, metrics.l1_penalty
            );
            history.push(metrics);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let eval = evaluate(&model, &test_tensor, config);
        println!(
            "epoch {:02}: test loss {:.5} (recon {:.5}), latent sparsity {:.3} (target {})",
            epoch, eval.loss, eval.recon_loss, eval.latent_sparsity, config.sparsity
        );
        checkpoint(&model, results_dir, epoch)?;
    }

    let final_train = history
        .last()
        .cloned()
        .ok_or_else(|| anyhow!("training history is empty"))?;
    let final_test = evaluate(&model, &test_tensor, config);

    println!(
        "final test: loss {:.5} (recon {:.5}), latent sparsity {:.3}",
        final_test.loss, final_test.recon_loss, final_test.latent_sparsity
    );

    Ok(TrainingOutcome {
        history,
        final_train,
        final_test,
    })
}

fn evaluate(
    model: &Autoencoder<TrainingBackend>,
    test: &Tensor<TrainingBackend, 2>,
    config: &TrainConfig,
) -> EvaluationMetrics {
    let (recon, latent) = model.forward(test.clone());
    let recon_loss = MseLoss::new().forward(recon, test.clone(), Reduction::Mean);
    let l1_penalty = latent.clone().abs().mean().mul_scalar(config.l1);
    let loss = recon_loss.clone() + l1_penalty;
    let latent_sparsity = latent
        .abs()
        .lower_elem(NEAR_ZERO)
        .float()
        .mean()
        .into_scalar()
        .elem::<f32>();

    EvaluationMetrics {
        loss: loss.into_scalar().elem::<f32>(),
        recon_loss: recon_loss.into_scalar().elem::<f32>(),
        latent_sparsity,
    }
}

fn checkpoint(
    model: &Autoencoder<TrainingBackend>,
    results_dir: &Path,
    epoch: usize,
) -> Result<()> {
    let path = results_dir.join(format!("checkpoint_epoch{epoch:03}"));
    model
        .clone()
        .save_file(path.clone(), &CompactRecorder::new())
        .with_context(|| format!("failed to write checkpoint {}", path.display()))?;
    Ok(())
}

fn tensor_from_rows<B: Backend>(rows: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let shape = [rows.nrows(), rows.ncols()];
    let values: Vec<f32> = rows.iter().copied().collect();
    Tensor::from_floats(TensorData::new(values, shape), device)
}

fn write_report(
    report_path: &Path,
    config: &TrainConfig,
    data_dir: &Path,
    subject: u32,
    mode: RunMode,
    outcome: &TrainingOutcome,
) -> Result<()> {
    let sections = [
        ReportSection::new("overview", render_overview_section(config, subject, mode)),
        ReportSection::new("configuration", render_configuration_section(config)),
        ReportSection::new(
            "metrics",
            render_metrics_section(config, &outcome.history, &outcome.final_test),
        ),
        ReportSection::new(
            "surface-maps",
            render_surface_section(data_dir, subject, &config.roi_class),
        ),
    ];

    update_sections(report_path, &sections)
}

fn render_overview_section(config: &TrainConfig, subject: u32, mode: RunMode) -> String {
    format!(
        "Sparse autoencoder on subject {} voxel responses, ROI class `{}`, hemisphere `{}` ({} mode).",
        subject,
        config.roi_class,
        config.hem.label(),
        mode.label()
    )
}

fn render_configuration_section(config: &TrainConfig) -> String {
    format!(
        "- Learning rate: {}\n- Latent units: {}\n- Batch size: {}\n- Epochs: {}\n- ROI class: {}\n- Hemisphere: {}\n- Dataset: {}\n- Sparsity target: {}\n- L1 weight: {}\n",
        config.learning_rate,
        config.latent_dim,
        config.batch_size,
        config.num_epochs,
        config.roi_class,
        config.hem.label(),
        config.ds,
        config.sparsity,
        config.l1
    )
}

fn render_metrics_section(
    config: &TrainConfig,
    history: &[StepMetrics],
    final_test: &EvaluationMetrics,
) -> String {
    let mut output = String::new();

    if let Some(train) = history.last() {
        let _ = writeln!(
            &mut output,
            "- Final train loss: {:.5} (recon {:.5}, l1 {:.5})",
            train.loss, train.recon_loss, train.l1_penalty
        );
    }
    let _ = writeln!(
        &mut output,
        "- Final test loss: {:.5} (recon {:.5})\n- Latent sparsity: {:.3} (target {})\n",
        final_test.loss, final_test.recon_loss, final_test.latent_sparsity, config.sparsity
    );

    let epoch_ends = epoch_end_metrics(history);
    if !epoch_ends.is_empty() {
        let _ = writeln!(&mut output, "| Epoch | Train Loss | Recon | L1 |");
        let _ = writeln!(&mut output, "| --- | --- | --- | --- |");
        for metrics in epoch_ends {
            let _ = writeln!(
                &mut output,
                "| {} | {:.5} | {:.5} | {:.5} |",
                metrics.epoch, metrics.loss, metrics.recon_loss, metrics.l1_penalty
            );
        }
    }

    output
}

/// Last recorded step of each epoch, in epoch order.
fn epoch_end_metrics(history: &[StepMetrics]) -> Vec<&StepMetrics> {
    let mut ends: Vec<&StepMetrics> = Vec::new();
    for metrics in history {
        let same_epoch = ends.last().map_or(false, |last| last.epoch == metrics.epoch);
        if same_epoch {
            let slot = ends.len() - 1;
            ends[slot] = metrics;
        } else {
            ends.push(metrics);
        }
    }
    ends
}

/// The surface map is inspection-only: a failure here is reported in the
/// section body but never aborts a finished training run.
fn render_surface_section(data_dir: &Path, subject: u32, roi_class: &str) -> String {
    match surface_map_markdown(data_dir, subject, roi_class) {
        Ok(markdown) => markdown,
        Err(err) => {
            println!("surface map rendering skipped: {err:#}");
            format!("Surface map unavailable: {err:#}")
        }
    }
}

fn surface_map_markdown(data_dir: &Path, subject: u32, roi_class: &str) -> Result<String> {
    let mut output = String::new();

    for hemisphere in [Hemisphere::Left, Hemisphere::Right] {
        let maps = RoiSurfaceMaps::load(data_dir, subject, roi_class, hemisphere)?;
        let fmri = load_hemisphere_fmri(data_dir, subject, hemisphere)?;
        if fmri.nrows() == 0 {
            return Err(anyhow!(
                "subject {subject} {} fMRI array has no stimulus rows",
                hemisphere.prefix()
            ));
        }

        let projected = project_class(&maps, fmri.row(0))?;
        let data_url = encode_surface_png_data_url(&projected.to_vec(), SURFACE_STRIP_WIDTH)?;
        let _ = writeln!(
            &mut output,
            "#### {} `{}`, stimulus 0\n\n![fsaverage projection, {} hemisphere]({})\n",
            roi_class,
            hemisphere.prefix(),
            hemisphere.prefix(),
            data_url
        );

        // Per-ROI breakdown for the same stimulus.
        for roi in maps.roi_names().map(str::to_string).collect::<Vec<_>>() {
            let roi_map = surface::project_roi(&maps, fmri.row(0), &roi)?;
            let roi_url = encode_surface_png_data_url(&roi_map.to_vec(), SURFACE_STRIP_WIDTH)?;
            let _ = writeln!(
                &mut output,
                "![{} {}]({})\n",
                roi,
                hemisphere.prefix(),
                roi_url
            );
        }
    }

    Ok(output)
}

fn load_benchmark(path: &Path) -> Result<Option<BenchmarkSnapshot>> {
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read benchmark from {}", path.display()))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse benchmark at {}", path.display()))?;
        Ok(Some(snapshot))
    } else {
        Ok(None)
    }
}

fn save_benchmark(path: &Path, snapshot: &BenchmarkSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write benchmark to {}", path.display()))?;
    Ok(())
}

fn validate_benchmark(actual: &BenchmarkSnapshot, reference: &BenchmarkSnapshot) -> Result<()> {
    ensure_close(
        actual.final_train.loss,
        reference.final_train.loss,
        "final train loss",
    )?;
    ensure_close(
        actual.final_train.recon_loss,
        reference.final_train.recon_loss,
        "final train recon loss",
    )?;
    ensure_close(
        actual.final_train.l1_penalty,
        reference.final_train.l1_penalty,
        "final train l1 penalty",
    )?;
    ensure_close(
        actual.final_test.loss,
        reference.final_test.loss,
        "final test loss",
    )?;
    ensure_close(
        actual.final_test.recon_loss,
        reference.final_test.recon_loss,
        "final test recon loss",
    )?;
    ensure_close(
        actual.final_test.latent_sparsity,
        reference.final_test.latent_sparsity,
        "final latent sparsity",
    )?;
    Ok(())
}

fn ensure_close(actual: f32, expected: f32, label: &str) -> Result<()> {
    if (actual - expected).abs() > BENCHMARK_TOLERANCE {
        Err(anyhow!(
            "{} deviated from benchmark (actual {:.5} vs expected {:.5}, tol {:.5})",
            label,
            actual,
            expected,
            BENCHMARK_TOLERANCE
        ))
    } else {
        Ok(())
    }
}
