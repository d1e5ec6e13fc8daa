use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use nsdae_core::{HemisphereSelection, TrainConfig};

/// How much of the configured run to execute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    Full,
    /// Shortened run used to capture or check a benchmark snapshot.
    Test,
}

impl RunMode {
    fn from_str(value: &str) -> Result<Self> {
        match value {
            "full" => Ok(Self::Full),
            "test" => Ok(Self::Test),
            other => Err(anyhow!("invalid mode: {}", other)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Test => "test",
        }
    }

    pub fn epochs(&self, configured: usize) -> usize {
        match self {
            Self::Full => configured,
            Self::Test => configured.min(2),
        }
    }
}

/// Parsed command line: the training configuration plus run-level options.
#[derive(Clone, Debug)]
pub struct CliArgs {
    pub config: TrainConfig,
    pub data_dir: PathBuf,
    pub subject: u32,
    pub mode: RunMode,
    pub help_requested: bool,
}

impl CliArgs {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = TrainConfig::default();
        let mut data_dir = PathBuf::from("data");
        let mut subject = 3u32;
        let mut mode = RunMode::Full;
        let mut help_requested = false;

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            if arg == "--help" || arg == "-h" {
                help_requested = true;
                continue;
            }
            let (flag, value) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), value.to_string()),
                None => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("expected value after {}", arg))?;
                    (arg, value)
                }
            };
            match flag.as_str() {
                "--learning_rate" => config.learning_rate = parse_value(&flag, &value)?,
                "--latent_dim" => config.latent_dim = parse_value(&flag, &value)?,
                "--batch_size" => config.batch_size = parse_value(&flag, &value)?,
                "--num_epochs" => config.num_epochs = parse_value(&flag, &value)?,
                "--roi_class" => config.roi_class = value,
                "--hem" => config.hem = HemisphereSelection::from_str(&value)?,
                "--ds" => config.ds = value,
                "--sparsity" => config.sparsity = parse_value(&flag, &value)?,
                "--l1" => config.l1 = parse_value(&flag, &value)?,
                "--data_dir" => data_dir = PathBuf::from(value),
                "--subject" => subject = parse_value(&flag, &value)?,
                "--mode" | "-m" => mode = RunMode::from_str(&value)?,
                other => return Err(anyhow!("unexpected argument: {}", other)),
            }
        }

        if !help_requested {
            config.validate()?;
        }

        Ok(Self {
            config,
            data_dir,
            subject,
            mode,
            help_requested,
        })
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid value for {}: {}", flag, value))
}

pub fn print_usage() {
    println!("Usage: cargo run -p nsdae-experiment-fmri -- [options]");
    println!();
    println!("Options (defaults in parentheses):");
    println!("  --learning_rate <f>   optimizer step size (1e-4)");
    println!("  --latent_dim <n>      latent units (30)");
    println!("  --batch_size <n>      rows per batch (30)");
    println!("  --num_epochs <n>      passes over the training rows (15)");
    println!("  --roi_class <name>    ROI class, e.g. floc-bodies (floc-bodies)");
    println!("  --hem all|lh|rh       hemisphere selection (all)");
    println!("  --ds <name>           dataset selector (fmri)");
    println!("  --sparsity <f>        target latent sparsity fraction (0.8)");
    println!("  --l1 <f>              L1 penalty weight on latents (0.1)");
    println!("  --data_dir <path>     NSD release root (data)");
    println!("  --subject <n>         subject number 1-8 (3)");
    println!("  --mode full|test      shortened run for benchmarks (full)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs> {
        CliArgs::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_without_arguments() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.config.latent_dim, 30);
        assert_eq!(args.config.hem, HemisphereSelection::All);
        assert_eq!(args.subject, 3);
        assert_eq!(args.mode, RunMode::Full);
    }

    #[test]
    fn accepts_space_and_equals_forms() {
        let args = parse(&["--latent_dim", "64", "--sparsity=0.5", "--hem=lh"]).unwrap();
        assert_eq!(args.config.latent_dim, 64);
        assert_eq!(args.config.sparsity, 0.5);
        assert_eq!(args.config.hem, HemisphereSelection::Left);
    }

    #[test]
    fn rejects_invalid_hemisphere() {
        let err = parse(&["--hem", "both"]).unwrap_err();
        assert!(err.to_string().contains("invalid hemisphere selector"));
    }

    #[test]
    fn rejects_unknown_flags_and_bad_values() {
        assert!(parse(&["--momentum", "0.9"]).is_err());
        assert!(parse(&["--latent_dim", "many"]).is_err());
        assert!(parse(&["--latent_dim"]).is_err());
    }

    #[test]
    fn validation_applies_to_parsed_config() {
        let err = parse(&["--batch_size", "0"]).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn help_skips_validation() {
        let args = parse(&["--help", "--batch_size", "0"]).unwrap();
        assert!(args.help_requested);
    }

    #[test]
    fn test_mode_caps_epochs() {
        let args = parse(&["--mode", "test", "--num_epochs", "15"]).unwrap();
        assert_eq!(args.mode.epochs(args.config.num_epochs), 2);
        assert_eq!(RunMode::Full.epochs(15), 15);
    }
}
