use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use syllable_stimuli::audio::SampleEncoding;
use syllable_stimuli::batch::REPORT_FILE_NAME;
use syllable_stimuli::rename::rename_directory;
use syllable_stimuli::stages::{
    AlignConfig, DenoiseConfig, Denoiser, LoudnessConfig, LoudnessNormalizer, OnsetAligner,
    PaddingPolicy, ResampleConfig, Resampler, SmoothConfig, SpectralSmoother, StageSequence,
    TrimConfig, Trimmer,
};
use syllable_stimuli::validation::{verify_output, Expectations};
use syllable_stimuli::{BatchResult, BatchRunner, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "syllable-stimuli")]
#[command(about = "Prepare spoken-syllable recordings as experiment stimuli", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full chain: align, normalize, denoise, resample, smooth
    Process {
        #[command(flatten)]
        dirs: DirArgs,

        /// JSON pipeline configuration (missing fields keep their defaults)
        #[arg(short = 'c', long)]
        config: Option<String>,

        /// Align every file to the earliest onset found in the directory
        #[arg(long)]
        group_align: bool,

        /// Skip verification of the written files
        #[arg(long)]
        no_verify: bool,
    },

    /// Cut each clip at its onset to a fixed duration
    Align {
        #[command(flatten)]
        dirs: DirArgs,

        /// Output duration in seconds
        #[arg(long, default_value_t = AlignConfig::default().target_duration_secs)]
        duration: f64,

        /// Onset threshold as a fraction of peak short-window energy
        #[arg(long, default_value_t = AlignConfig::default().onset_threshold)]
        threshold: f64,

        /// Silence kept before the onset, in seconds
        #[arg(long, default_value_t = AlignConfig::default().pre_roll_secs)]
        pre_roll: f64,

        /// Pad short clips on both sides instead of at the end
        #[arg(long)]
        centered: bool,
    },

    /// Normalize integrated loudness
    Normalize {
        #[command(flatten)]
        dirs: DirArgs,

        /// Target loudness in LUFS
        #[arg(long, default_value_t = LoudnessConfig::default().target_lufs, allow_hyphen_values = true)]
        target: f64,
    },

    /// Spectral subtraction using the leading segment as noise profile
    Denoise {
        #[command(flatten)]
        dirs: DirArgs,

        /// Length of the leading noise segment, in seconds
        #[arg(long, default_value_t = DenoiseConfig::default().noise_profile_secs)]
        noise_secs: f64,

        /// Proportion of the noise profile removed (0..=1)
        #[arg(long, default_value_t = DenoiseConfig::default().reduction)]
        reduction: f32,
    },

    /// Resample to a fixed rate
    Resample {
        #[command(flatten)]
        dirs: DirArgs,

        /// Target sample rate in Hz
        #[arg(long, default_value_t = ResampleConfig::default().target_sample_rate)]
        rate: u32,
    },

    /// Zero-phase Butterworth low-pass
    Smooth {
        #[command(flatten)]
        dirs: DirArgs,

        /// Filter order
        #[arg(long, default_value_t = SmoothConfig::default().filter_order)]
        order: usize,

        /// Cutoff frequency in Hz
        #[arg(long, default_value_t = SmoothConfig::default().cutoff_hz)]
        cutoff: f64,
    },

    /// Cut a fixed time window from every clip
    Trim {
        #[command(flatten)]
        dirs: DirArgs,

        /// Window start in seconds
        #[arg(long)]
        start: f64,

        /// Window end in seconds
        #[arg(long)]
        end: f64,
    },

    /// Copy clips to canonical names (be.wav -> A1_e_b.wav)
    Rename {
        /// Directory of processed clips
        input: String,

        /// Directory receiving the renamed copies
        output: String,
    },

    /// Check processed clips for rate, length, range and loudness
    Verify {
        /// Directory of processed clips
        dir: String,

        /// JSON pipeline configuration the clips were produced with
        #[arg(short = 'c', long)]
        config: Option<String>,

        /// Expected sample rate (overrides the configuration)
        #[arg(long)]
        rate: Option<u32>,

        /// Expected number of samples (overrides the configuration)
        #[arg(long)]
        samples: Option<usize>,

        /// Expected loudness in LUFS (overrides the configuration)
        #[arg(long, allow_hyphen_values = true)]
        lufs: Option<f64>,

        /// Allowed loudness deviation in LU
        #[arg(long, default_value_t = 0.5)]
        tolerance: f64,
    },
}

#[derive(Args, Debug)]
struct DirArgs {
    /// Directory of input WAV files
    input: String,

    /// Output directory (must differ from the input)
    output: String,

    /// Process files one at a time
    #[arg(long)]
    sequential: bool,

    /// Sample format of written files
    #[arg(long, value_enum)]
    encoding: Option<EncodingArg>,

    /// Write the JSON batch report to this path
    #[arg(long)]
    report: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EncodingArg {
    Pcm16,
    Pcm24,
    Float32,
}

impl From<EncodingArg> for SampleEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Pcm16 => SampleEncoding::Pcm16,
            EncodingArg::Pcm24 => SampleEncoding::Pcm24,
            EncodingArg::Float32 => SampleEncoding::Float32,
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn load_config(path: Option<&str>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let path = expand(path);
            log::info!("Loading configuration from {:?}", path);
            PipelineConfig::from_json_file(&path)
                .with_context(|| format!("Failed to load configuration {:?}", path))
        }
        None => Ok(PipelineConfig::default()),
    }
}

impl DirArgs {
    fn runner(&self, config: &PipelineConfig) -> BatchRunner {
        let mut runner = BatchRunner::from_config(config);
        if self.sequential {
            runner = runner.with_parallel(false);
        }
        if let Some(encoding) = self.encoding {
            runner = runner.with_encoding(encoding.into());
        }
        runner
    }

    fn run_stage(&self, sequence: StageSequence) -> Result<BatchResult> {
        let input = expand(&self.input);
        let output = expand(&self.output);
        let result = self
            .runner(&PipelineConfig::default())
            .run(&input, &output, &sequence)
            .with_context(|| format!("Batch over {:?} failed", input))?;
        self.finish(&result, None)?;
        Ok(result)
    }

    /// Log the summary and write the report, to `--report` or `default_path`
    fn finish(&self, result: &BatchResult, default_path: Option<PathBuf>) -> Result<()> {
        result.log_summary();
        if let Some(path) = self.report.as_deref().map(expand).or(default_path) {
            result
                .write_json(&path)
                .with_context(|| format!("Failed to write report {:?}", path))?;
            log::info!("Report written to {:?}", path);
        }
        Ok(())
    }
}

fn process(dirs: &DirArgs, config: Option<&str>, group_align: bool, no_verify: bool) -> Result<()> {
    let mut config = load_config(config)?;
    if group_align {
        config = config.with_group_alignment(true);
    }

    let input = expand(&dirs.input);
    let output = expand(&dirs.output);
    let result = dirs
        .runner(&config)
        .run_pipeline(&input, &output, &config)
        .with_context(|| format!("Processing {:?} failed", input))?;
    dirs.finish(&result, Some(output.join(REPORT_FILE_NAME)))?;

    if !no_verify {
        log::info!("Running post-processing verification...");
        verify(&output, &Expectations::from_config(&config))?;
    }
    Ok(())
}

fn verify(dir: &Path, expect: &Expectations) -> Result<()> {
    let report =
        verify_output(dir, expect).with_context(|| format!("Failed to verify {:?}", dir))?;
    report.log_summary();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Command::Process {
            dirs,
            config,
            group_align,
            no_verify,
        } => process(&dirs, config.as_deref(), group_align, no_verify)?,

        Command::Align {
            dirs,
            duration,
            threshold,
            pre_roll,
            centered,
        } => {
            let padding = if centered {
                PaddingPolicy::Centered
            } else {
                PaddingPolicy::Tail
            };
            let config = AlignConfig::default()
                .with_target_duration(duration)
                .with_onset_threshold(threshold)
                .with_pre_roll(pre_roll)
                .with_padding(padding);
            dirs.run_stage(StageSequence::new().then(OnsetAligner::new(config)?))?;
        }

        Command::Normalize { dirs, target } => {
            let config = LoudnessConfig::default().with_target(target);
            dirs.run_stage(StageSequence::new().then(LoudnessNormalizer::new(config)?))?;
        }

        Command::Denoise {
            dirs,
            noise_secs,
            reduction,
        } => {
            let config = DenoiseConfig::default()
                .with_noise_profile(noise_secs)
                .with_reduction(reduction);
            dirs.run_stage(StageSequence::new().then(Denoiser::new(config)?))?;
        }

        Command::Resample { dirs, rate } => {
            let config = ResampleConfig::default().with_target_rate(rate);
            dirs.run_stage(StageSequence::new().then(Resampler::new(config)?))?;
        }

        Command::Smooth {
            dirs,
            order,
            cutoff,
        } => {
            let config = SmoothConfig::default()
                .with_order(order)
                .with_cutoff(cutoff);
            dirs.run_stage(StageSequence::new().then(SpectralSmoother::new(config)?))?;
        }

        Command::Trim { dirs, start, end } => {
            let trimmer = Trimmer::new(TrimConfig::new(start, end))?;
            dirs.run_stage(StageSequence::new().then(trimmer))?;
        }

        Command::Rename { input, output } => {
            let input = expand(&input);
            let output = expand(&output);
            let report = rename_directory(&input, &output)
                .with_context(|| format!("Failed to rename files from {:?}", input))?;
            report.log_summary();
        }

        Command::Verify {
            dir,
            config,
            rate,
            samples,
            lufs,
            tolerance,
        } => {
            let mut expect = match config {
                Some(path) => Expectations::from_config(&load_config(Some(path.as_str()))?),
                None => Expectations::default(),
            };
            if let Some(rate) = rate {
                expect = expect.with_sample_rate(rate);
            }
            if let Some(samples) = samples {
                expect = expect.with_samples(samples);
            }
            if let Some(lufs) = lufs {
                expect = expect.with_loudness(lufs, tolerance);
            } else {
                expect.loudness_tolerance = tolerance;
            }
            verify(&expand(&dir), &expect)?;
        }
    }

    Ok(())
}
