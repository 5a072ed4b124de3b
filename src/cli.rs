use std::fmt::{Display, Write as _};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use clap::{ArgAction, Args, ColorChoice, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::aot::{Generator, Shell, generate};
use clap_complete_nushell::Nushell;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use serde::Serialize;
use tracing::info;

use reddim::{
    AppResult, Decomposition, DistanceMetric, FeaturePreparer, MetricSettings, Norm,
    PreparedFeatures, ProjectionSource, RedDimPNorm, ReducedBasis, covariance_decomposition,
    io_utils,
};

const STYLES: Styles = Styles::styled()
    .header(Style::new().bold())
    .usage(Style::new().bold())
    .error(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))))
    .literal(
        Style::new()
            .bold()
            .fg_color(Some(Color::Ansi(AnsiColor::Green))),
    )
    .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
    .valid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
    .invalid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightRed))))
    .context(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Magenta))))
    .context_value(
        Style::new()
            .bold()
            .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
    );

/// Long-form CLI description shown in `--help`.
const LONG_ABOUT: &str = "reddim - compare trajectory frames in a reduced eigenbasis

Frame features (dihedrals, contacts, positions, ...) are projected onto the
leading vectors of a precomputed eigen-decomposition, such as the principal
components of their covariance, and compared there with a p-norm.

Decomposition and feature files may be .json, .bin (bincode) or .zst
(zstd-compressed bincode). Defaults for the metric and the reduction are read
from $XDG_CONFIG_HOME/reddim/config.json, or the file named by REDDIM_CONFIG.";

/// reddim - reduced-dimensionality distances between trajectory frames.
#[derive(Parser, Debug, Clone)]
#[command(author, version, propagate_version = true, about, long_about = Some(LONG_ABOUT), styles = STYLES)]
pub struct Cli {
    /// Color choice for the output
    #[arg(long, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Subcommand to run
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Top-level commands supported by the CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Show which components survive filtering and reduction
    Inspect {
        #[command(flatten)]
        projection: ProjectionArgs,
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Filter and reduce a decomposition, then save the basis
    ///
    /// The saved basis can be passed back with `--reduced` to skip the
    /// filtering and reduction steps.
    Reduce {
        #[command(flatten)]
        projection: ProjectionArgs,
        /// File to write the reduced basis to
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Project frame features into the reduced space
    Project {
        #[command(flatten)]
        projection: ProjectionArgs,
        #[command(flatten)]
        features: FeatureArgs,
        /// File to write the projected frames to
        /// If not provided, prints JSON to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Distances from one frame to every frame of a trajectory
    Distance {
        #[command(flatten)]
        projection: ProjectionArgs,
        #[command(flatten)]
        features: FeatureArgs,
        /// Index of the reference frame in FEATURES
        #[arg(short, long)]
        index: usize,
        /// Compare against the frames in this file instead of FEATURES
        #[arg(long)]
        other: Option<PathBuf>,
        /// File to write the distances to
        /// If not provided, prints JSON to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Condensed pairwise distance matrix between all frames
    Pairwise {
        #[command(flatten)]
        projection: ProjectionArgs,
        #[command(flatten)]
        features: FeatureArgs,
        /// File to write the condensed distances to
        /// If not provided, prints JSON to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Build a decomposition from the covariance of frame features (PCA)
    Decompose {
        #[command(flatten)]
        features: FeatureArgs,
        /// File to write the decomposition to
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Generate shell completion for a given shell
    Completion {
        /// Output file to write the completion script to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// The shell to generate the completion for
        #[arg(value_enum)]
        shell: CompletionShell,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },
}

/// Supported completion targets for shell auto-completion.
#[derive(ValueEnum, Clone, Debug)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
    Nushell,
}

impl Display for CompletionShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompletionShell::Bash => "bash",
            CompletionShell::Zsh => "zsh",
            CompletionShell::Fish => "fish",
            CompletionShell::PowerShell => "powershell",
            CompletionShell::Elvish => "elvish",
            CompletionShell::Nushell => "nushell",
        };
        write!(f, "{}", s)
    }
}

impl Generator for &CompletionShell {
    fn generate(&self, cmd: &clap::builder::Command, buf: &mut dyn Write) {
        match self {
            CompletionShell::Bash => Shell::Bash.generate(cmd, buf),
            CompletionShell::Zsh => Shell::Zsh.generate(cmd, buf),
            CompletionShell::Fish => Shell::Fish.generate(cmd, buf),
            CompletionShell::PowerShell => Shell::PowerShell.generate(cmd, buf),
            CompletionShell::Elvish => Shell::Elvish.generate(cmd, buf),
            CompletionShell::Nushell => Nushell.generate(cmd, buf),
        }
    }

    fn file_name(&self, name: &str) -> String {
        match self {
            CompletionShell::Bash => Shell::Bash.file_name(name),
            CompletionShell::Zsh => Shell::Zsh.file_name(name),
            CompletionShell::Fish => Shell::Fish.file_name(name),
            CompletionShell::PowerShell => Shell::PowerShell.file_name(name),
            CompletionShell::Elvish => Shell::Elvish.file_name(name),
            CompletionShell::Nushell => Nushell.file_name(name),
        }
    }
}

/// Where the projection comes from and how to reduce and measure with it.
///
/// Flags override the settings file.
#[derive(Args, Debug, Clone)]
pub struct ProjectionArgs {
    /// Decomposition file with projection vectors and eigenvalues
    #[arg(value_name = "DECOMPOSITION")]
    pub projection: PathBuf,

    /// The file is a basis saved by `reddim reduce`; skip filtering and reduction
    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub reduced: bool,

    /// Settings file to read instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Keep this many leading vectors
    #[arg(short, long)]
    pub num_vecs: Option<usize>,

    /// Keep the leading vectors explaining this fraction of the variance, in (0, 1]
    #[arg(short, long)]
    pub expl_var: Option<f64>,

    /// Keep vectors whose eigenvalue is at least this value
    #[arg(short, long)]
    pub abs_min: Option<f64>,

    /// Drop components whose eigenvalue is at or above this value
    /// Defaults to 1
    #[arg(long, conflicts_with = "no_eigenvalue_cap")]
    pub max_eigenvalue: Option<f64>,

    /// Keep components regardless of eigenvalue size
    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub no_eigenvalue_cap: bool,

    /// Norm applied in the reduced space
    #[arg(short, long, value_enum)]
    pub metric: Option<Norm>,

    /// Exponent for the minkowski norm
    #[arg(short, long)]
    pub p: Option<f64>,
}

impl ProjectionArgs {
    /// Settings file values with flags layered on top.
    fn settings(&self) -> AppResult<MetricSettings> {
        let mut settings = MetricSettings::load(self.config.as_deref())?;
        if self.num_vecs.is_some() || self.expl_var.is_some() || self.abs_min.is_some() {
            // a criterion on the command line replaces the configured one
            settings.num_vecs = self.num_vecs;
            settings.expl_var = self.expl_var;
            settings.abs_min = self.abs_min;
        }
        if self.no_eigenvalue_cap {
            settings.max_eigenvalue = None;
        } else if let Some(cap) = self.max_eigenvalue {
            settings.max_eigenvalue = Some(cap);
        }
        if let Some(metric) = self.metric {
            settings.metric = metric;
        }
        if let Some(p) = self.p {
            settings.p = p;
        }
        Ok(settings)
    }

    fn source(&self) -> ProjectionSource {
        if self.reduced {
            ProjectionSource::Reduced(self.projection.clone())
        } else {
            ProjectionSource::Decomposition(self.projection.clone())
        }
    }

    fn build_metric(&self) -> AppResult<RedDimPNorm<FeaturePreparer>> {
        let settings = self.settings()?;
        RedDimPNorm::new(
            &self.source(),
            FeaturePreparer,
            &settings.reduction(),
            &settings.filter(),
            settings.vectorized()?,
        )
    }
}

/// Frame features computed ahead of time.
#[derive(Args, Debug, Clone)]
pub struct FeatureArgs {
    /// Feature file holding `{"flat": <frames x features>}` or `{"framed": <frames x n x m>}`
    #[arg(value_name = "FEATURES")]
    pub features: PathBuf,
}

impl FeatureArgs {
    fn load(&self) -> AppResult<PreparedFeatures> {
        load_features(&self.features)
    }
}

fn load_features(path: &Path) -> AppResult<PreparedFeatures> {
    let features: PreparedFeatures = io_utils::read_file(path)?;
    info!("Loaded {} frames from {}", features.n_frames(), path.display());
    Ok(features)
}

/// Helper trait for accessing verbosity flags on commands.
pub trait GetVerbosity {
    fn get_verbosity(&self) -> &Verbosity<InfoLevel>;
}

impl GetVerbosity for Cmd {
    fn get_verbosity(&self) -> &Verbosity<InfoLevel> {
        match self {
            Cmd::Inspect { verbosity, .. } => verbosity,
            Cmd::Reduce { verbosity, .. } => verbosity,
            Cmd::Project { verbosity, .. } => verbosity,
            Cmd::Distance { verbosity, .. } => verbosity,
            Cmd::Pairwise { verbosity, .. } => verbosity,
            Cmd::Decompose { verbosity, .. } => verbosity,
            Cmd::Completion { verbosity, .. } => verbosity,
        }
    }
}

/// Write `value` to `output` in the format its extension names, or print JSON.
fn emit<T: Serialize>(output: Option<&Path>, value: &T) -> AppResult<()> {
    match output {
        Some(path) => {
            io_utils::write_file(path, value)?;
            info!("Wrote {}", path.display());
        }
        None => {
            let json = serde_json::to_string_pretty(value)?;
            tracing_indicatif::indicatif_println!("{json}");
        }
    }
    Ok(())
}

impl Cli {
    /// Whether log output should carry ANSI colors.
    pub fn ansi(&self) -> bool {
        match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::stderr().is_terminal(),
        }
    }
}

impl Cmd {
    /// Execute the chosen top-level command.
    #[tracing::instrument(name = "Running command", level = "info", skip(self))]
    pub fn run(&self) -> AppResult<()> {
        match self {
            Cmd::Inspect { projection, .. } => run_inspect(projection),
            Cmd::Reduce {
                projection, output, ..
            } => {
                let metric = projection.build_metric()?;
                metric.basis().save(output)?;
                info!(
                    "Saved {} of {} vectors to {}",
                    metric.basis().n_components(),
                    metric.basis().n_total(),
                    output.display()
                );
                Ok(())
            }
            Cmd::Project {
                projection,
                features,
                output,
                ..
            } => {
                let metric = projection.build_metric()?;
                let ptraj = metric.prepare_trajectory(&features.load()?)?;
                emit(output.as_deref(), &ptraj)
            }
            Cmd::Distance {
                projection,
                features,
                index,
                other,
                output,
                ..
            } => {
                let metric = projection.build_metric()?;
                let ptraj1 = metric.prepare_trajectory(&features.load()?)?;
                let ptraj2 = match other {
                    Some(path) => metric.prepare_trajectory(&load_features(path)?)?,
                    None => ptraj1.clone(),
                };
                let dists = metric.one_to_all(ptraj1.view(), ptraj2.view(), *index)?;
                emit(output.as_deref(), &dists)
            }
            Cmd::Pairwise {
                projection,
                features,
                output,
                ..
            } => {
                let metric = projection.build_metric()?;
                let ptraj = metric.prepare_trajectory(&features.load()?)?;
                let dists = metric.all_pairwise(ptraj.view())?;
                emit(output.as_deref(), &dists)
            }
            Cmd::Decompose {
                features, output, ..
            } => {
                let rows = features.load()?.into_rows()?;
                let raw = covariance_decomposition(rows.view())?;
                io_utils::write_file(output, &raw)?;
                info!(
                    "Wrote {} components over {} features to {}",
                    raw.vals.len(),
                    raw.vecs.nrows(),
                    output.display()
                );
                Ok(())
            }
            Cmd::Completion { shell, output, .. } => {
                let mut cmd = Cli::command();
                if let Some(output_path) = output {
                    let mut file = std::fs::OpenOptions::new()
                        .write(true)
                        .truncate(true)
                        .create(true)
                        .open(output_path)?;
                    generate(shell, &mut cmd, "reddim", &mut file);
                    info!(
                        "Generated completion script for {} at {}",
                        shell,
                        output_path.display()
                    );
                } else {
                    generate(shell, &mut cmd, "reddim", &mut std::io::stdout());
                }
                Ok(())
            }
        }
    }
}

/// Print the eigenvalue table with the retained components marked.
fn run_inspect(projection: &ProjectionArgs) -> AppResult<()> {
    let mut table = String::new();
    if projection.reduced {
        let basis = ReducedBasis::load(&projection.projection)?;
        writeln!(
            table,
            "Reduced basis: {} of {} vectors over {} features",
            basis.n_components(),
            basis.n_total(),
            basis.n_features()
        )?;
        for (i, val) in basis.vals().iter().enumerate() {
            writeln!(table, "{:>5}  {:>14.6e}", i, val)?;
        }
    } else {
        let settings = projection.settings()?;
        let reduction = settings.reduction();
        let decomposition = Decomposition::load(&projection.projection, &settings.filter())?;
        let kept = reduction.retained(decomposition.vals())?;
        writeln!(
            table,
            "{} of {} loaded components pass the filter, {} kept by {}",
            decomposition.n_components(),
            decomposition.n_loaded(),
            kept,
            reduction
        )?;
        writeln!(
            table,
            "{:>5}  {:>14}  {:>9}  {:>10}  kept",
            "index", "eigenvalue", "explained", "cumulative"
        )?;
        let ratios = decomposition.explained_variance_ratio();
        let mut cumulative = 0.0;
        for (i, (val, ratio)) in decomposition.vals().iter().zip(ratios.iter()).enumerate() {
            cumulative += ratio;
            writeln!(
                table,
                "{:>5}  {:>14.6e}  {:>8.2}%  {:>9.2}%  {}",
                i,
                val,
                ratio * 100.0,
                cumulative * 100.0,
                if i < kept { "*" } else { "" }
            )?;
        }
    }
    tracing_indicatif::indicatif_println!("{}", table.trim_end());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection_args(args: &[&str]) -> ProjectionArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.cmd {
            Cmd::Inspect { projection, .. } => projection,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        std::fs::write(
            &config,
            r#"{"metric": "cityblock", "abs_min": 0.1, "max_eigenvalue": 0.5}"#,
        )
        .unwrap();
        let config = config.to_str().unwrap();

        let args = projection_args(&["reddim", "inspect", "pca.zst", "--config", config]);
        let settings = args.settings().unwrap();
        assert_eq!(settings.metric, Norm::Cityblock);
        assert_eq!(settings.reduction(), reddim::Reduction::AbsMin(0.1));
        assert_eq!(settings.max_eigenvalue, Some(0.5));

        let args = projection_args(&[
            "reddim",
            "inspect",
            "pca.zst",
            "--config",
            config,
            "--num-vecs",
            "3",
            "--no-eigenvalue-cap",
            "--metric",
            "minkowski",
            "-p",
            "3",
        ]);
        let settings = args.settings().unwrap();
        assert_eq!(settings.reduction(), reddim::Reduction::NumVecs(3));
        assert_eq!(settings.max_eigenvalue, None);
        assert_eq!(settings.vectorized().unwrap().norm(), Norm::Minkowski);
        assert_eq!(settings.p, 3.0);
    }

    #[test]
    fn reduced_flag_selects_the_source() {
        let args = projection_args(&["reddim", "inspect", "basis.bin", "--reduced"]);
        assert_eq!(
            args.source(),
            ProjectionSource::Reduced(PathBuf::from("basis.bin"))
        );
        assert!(
            Cli::try_parse_from([
                "reddim",
                "inspect",
                "pca.bin",
                "--max-eigenvalue",
                "2",
                "--no-eigenvalue-cap"
            ])
            .is_err()
        );
    }
}
